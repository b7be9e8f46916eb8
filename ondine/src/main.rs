use std::fs;
use std::io::IsTerminal;

use anyhow::{Context, Result};
use clap::Parser;
use ondine::rustyline_helper::{RustyLineHelper, TabEventHandler};
use ondine::session::{Outcome, Session};
use ondine::{display, display_error};
use rustyline::error::ReadlineError;
use rustyline::{Cmd, Config, Editor, EventHandler, KeyCode, KeyEvent, Modifiers};

/// Command line arguments, interpreted with `clap`.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// some files holding JSON-encoded expressions, one per line
    files: Vec<String>,
    /// remove syntax highlighting
    #[arg(long)]
    no_color: bool,
    /// log the dependency set of every evaluation
    #[arg(short, long)]
    verbose: bool,
}

/// The version of the program
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// The name of the program
const NAME: &str = env!("CARGO_PKG_NAME");

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut session = Session::new();

    // check if files are provided as command-line arguments
    if !args.files.is_empty() {
        for file in &args.files {
            let content = fs::read_to_string(file).with_context(|| format!("cannot read {file}"))?;
            for line in content.lines().filter(|line| is_input(line)) {
                process(&mut session, line, args.verbose);
            }
        }
        return Ok(());
    }

    // check if we are in a terminal
    if !(std::io::stdin().is_terminal() && std::io::stdout().is_terminal()) {
        return Ok(());
    }

    let helper = RustyLineHelper::new(!args.no_color);
    let config = Config::builder().completion_type(rustyline::CompletionType::List).build();
    let mut rl = Editor::with_config(config)?;
    rl.set_helper(Some(helper));
    rl.bind_sequence(KeyEvent::from('\t'), EventHandler::Conditional(Box::new(TabEventHandler)));
    rl.bind_sequence(KeyEvent(KeyCode::Enter, Modifiers::ALT), EventHandler::Simple(Cmd::Newline));

    println!("Welcome to {NAME} {VERSION}");

    loop {
        let readline = rl.readline("\u{00bb} ");
        match readline {
            Ok(line) if is_input(&line) => {
                let _ = rl.add_history_entry(line.as_str());
                if !process(&mut session, &line, args.verbose) {
                    break;
                }
            },
            Ok(_) => (),
            Err(ReadlineError::Interrupted) => {},
            Err(ReadlineError::Eof) => break,
            Err(err) => return Err(err.into()),
        }
    }

    Ok(())
}

/// Processes one line against the session; returns whether the session continues.
fn process(session: &mut Session, line: &str, verbose: bool) -> bool {
    match session.process_line(line) {
        Ok(Outcome::Evaluated(value, dependencies)) => {
            display(value, dependencies, session.arena(), verbose);
            true
        },
        Ok(Outcome::Done) => true,
        Ok(Outcome::Quit) => false,
        Err(err) => {
            display_error(&err);
            true
        },
    }
}

/// Tests whether the string is an input line (here, not blank and not a comment)
fn is_input(input: &str) -> bool {
    let trimmed = input.trim_start();
    !trimmed.is_empty() && !trimmed.starts_with("//")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_input_no_crash() {
        assert!(!is_input(""));
        assert!(is_input("1"));
        assert!(is_input("{}"));
    }

    #[test]
    fn is_input_false() {
        assert!(!is_input("    "));
        assert!(!is_input(" "));
        assert!(!is_input("// comment"));
    }

    #[test]
    fn is_input_true() {
        assert!(is_input("     {\"@builtin\":\"Add\"}"));
        assert!(is_input("  :state"));
        assert!(is_input("1 // not a comment"));
    }
}
