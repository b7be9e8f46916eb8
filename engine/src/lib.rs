//! The core of a reactive functional-expression evaluator.
//!
//! Terms live in an [arena](memory::arena::Arena) as content-addressed immutable values with
//! precomputed hashes. The [evaluator](eval) reduces terms against a host-supplied state
//! snapshot, accumulating the set of conditions it depended on; unresolved or failed
//! computations surface as signal terms rather than errors, so the host can resolve the missing
//! conditions and re-evaluate incrementally. Applications memoize through an
//! [invocation-fingerprint cache](eval::cache) that survives unrelated state changes.
//!
//! Terms can be built with functions from the [`memory::term`] module (or by name through
//! [`memory::term::builder`]), serialized through the [`json`] codec, and rendered with
//! [`memory::term::pretty`].

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
    clippy::arithmetic_side_effects,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss,
    clippy::implicit_return,
    clippy::match_same_arms,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::question_mark_used,
    clippy::redundant_pub_crate,
    clippy::single_call_fn,
    clippy::wildcard_enum_match_arm
)]
#![cfg_attr(
    test,
    allow(
        clippy::assertions_on_result_states,
        clippy::enum_glob_use,
        clippy::float_cmp,
        clippy::indexing_slicing,
        clippy::too_many_lines,
        clippy::unwrap_used,
        clippy::wildcard_imports,
    )
)]

pub mod builtins;
pub mod error;
pub mod eval;
pub mod host;
pub mod json;
pub mod memory;

pub use builtins::BuiltinId;
pub use error::{Error, Result};
pub use eval::{evaluate, Dependencies, State};
pub use host::{HostBindings, SystemHost};
pub use memory::arena::Arena;
pub use memory::term::{Term, TypeTag};
