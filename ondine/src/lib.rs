//! Ondine, an interactive toplevel for the reactive expression engine.
//!
//! `ondine` reads JSON-encoded expressions, evaluates them against an accumulated state
//! snapshot, and prints results together with the conditions still waiting on the host. Plain
//! JSON is data; objects whose single key starts with `@` encode expression forms (applications,
//! builtins, effects, lambdas), see [`expr`].

#![deny(
    clippy::complexity,
    clippy::correctness,
    clippy::nursery,
    clippy::pedantic,
    clippy::perf,
    clippy::style,
    clippy::suspicious
)]
#![allow(
    clippy::implicit_return,
    clippy::match_same_arms,
    clippy::missing_errors_doc,
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::print_stdout,
    clippy::question_mark_used,
    clippy::single_call_fn,
    clippy::wildcard_enum_match_arm
)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::wildcard_imports, clippy::enum_glob_use))]

pub mod expr;
pub mod rustyline_helper;
pub mod session;

use colored::Colorize;
use engine::memory::term::pretty;
use engine::{Arena, Dependencies, Term};

/// Toplevel function to display an evaluation outcome.
///
/// Values print after a green check mark; signals print after a red cross, followed by the
/// conditions the host would have to resolve before re-evaluating.
pub fn display(value: Term, dependencies: Dependencies, arena: &Arena, verbose: bool) {
    if value.is_signal(arena) {
        println!("{} {}", "\u{2717}".red(), pretty::Term(value, arena));
        if let Some(conditions) = value.signal_conditions(arena) {
            for condition in conditions.distinct_conditions(arena) {
                println!("  waiting on {}", pretty::Term(condition, arena));
            }
        }
    } else {
        println!("{} {}", "\u{2713}".green(), pretty::Term(value, arena));
    }
    if verbose {
        for condition in dependencies.conditions(arena) {
            log::info!("dependency: {}", pretty::Term(condition, arena));
        }
    }
}

/// Displays a toplevel error.
pub fn display_error(error: &anyhow::Error) {
    println!("{} {error}", "\u{2717}".red());
}
