//! The toplevel session: accumulated state entries and line processing.

use anyhow::{anyhow, Context, Result};
use engine::json::{parse, parse_prefix};
use engine::memory::term::pretty;
use engine::{evaluate, Arena, Dependencies, State, Term};

use crate::expr;

/// A toplevel session: one arena plus the state entries accumulated through `:let`.
pub struct Session {
    arena: Arena,
    /// Condition/value pairs, in insertion order; rebuilt into a snapshot term on change.
    entries: Vec<(Term, Term)>,
    state: State,
}

/// The outcome of processing one input line.
pub enum Outcome {
    /// An expression was evaluated.
    Evaluated(Term, Dependencies),
    /// A command was executed and printed its own output.
    Done,
    /// The session should end.
    Quit,
}

impl Session {
    #[must_use]
    pub fn new() -> Self {
        Self { arena: Arena::new(), entries: Vec::new(), state: State::empty() }
    }

    #[must_use]
    pub const fn arena(&self) -> &Arena {
        &self.arena
    }

    /// Processes one input line: a `:command` or a JSON-encoded expression.
    pub fn process_line(&mut self, line: &str) -> Result<Outcome> {
        let line = line.trim();
        if let Some(rest) = line.strip_prefix(':') {
            return self.process_command(rest);
        }
        let data = parse(line, &mut self.arena).context("invalid JSON")?;
        let expression = expr::decode(data, &mut self.arena)?;
        let (value, dependencies) = evaluate(expression, self.state, &mut self.arena);
        Ok(Outcome::Evaluated(value, dependencies))
    }

    fn process_command(&mut self, command: &str) -> Result<Outcome> {
        let (name, rest) = command.split_once(char::is_whitespace).unwrap_or((command, ""));
        match name {
            "let" => {
                self.bind(rest.trim())?;
                Ok(Outcome::Done)
            },
            "state" => {
                for &(condition, value) in &self.entries {
                    println!(
                        "{} -> {}",
                        pretty::Term(condition, &self.arena),
                        pretty::Term(value, &self.arena)
                    );
                }
                Ok(Outcome::Done)
            },
            "reset" => {
                self.arena.reset();
                self.entries.clear();
                self.state = State::empty();
                Ok(Outcome::Done)
            },
            "quit" => Ok(Outcome::Quit),
            _ => Err(anyhow!("unknown command :{name}")),
        }
    }

    /// Handles `:let <condition-json> <value-json>`: binds a condition to a value in the session
    /// state. Rebinding an equal condition replaces its value.
    fn bind(&mut self, arguments: &str) -> Result<()> {
        let (spec, consumed) = parse_prefix(arguments, &mut self.arena).context("invalid condition JSON")?;
        let condition = expr::decode_condition(spec, &mut self.arena)?;
        let value = parse(&arguments[consumed..], &mut self.arena).context("missing or invalid value JSON")?;
        let value = expr::decode(value, &mut self.arena)?;

        if let Some(entry) = self
            .entries
            .iter_mut()
            .find(|(existing, _)| existing.equals(condition, &self.arena))
        {
            entry.1 = value;
        } else {
            self.entries.push((condition, value));
        }
        self.state = State::from_entries(&self.entries, &mut self.arena);
        log::debug!("state now holds {} entries", self.entries.len());
        Ok(())
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn evaluated(outcome: Outcome) -> Term {
        match outcome {
            Outcome::Evaluated(value, _) => value,
            _ => panic!("expected an evaluated expression"),
        }
    }

    #[test]
    fn expressions_evaluate_against_session_state() {
        let mut session = Session::new();
        let pending = evaluated(session.process_line(r#"{"@effect":{"type":"now"}}"#).unwrap());
        assert!(pending.is_signal(session.arena()));

        session.process_line(r#":let {"type":"now"} 1234"#).unwrap();
        let resolved = evaluated(session.process_line(r#"{"@effect":{"type":"now"}}"#).unwrap());
        assert_eq!(resolved.as_int(session.arena()), Some(1234));
    }

    #[test]
    fn bound_values_may_be_structured() {
        let mut session = Session::new();
        session.process_line(r#":let {"type":"config","payload":"limits"} {"depth":[1,2]}"#).unwrap();
        let value = evaluated(
            session.process_line(r#"{"@effect":{"type":"config","payload":"limits"}}"#).unwrap(),
        );
        assert!(value.is_record(session.arena()));
    }

    #[test]
    fn rebinding_replaces_the_value() {
        let mut session = Session::new();
        session.process_line(r#":let {"type":"x"} 1"#).unwrap();
        session.process_line(r#":let {"type":"x"} 2"#).unwrap();
        let value = evaluated(session.process_line(r#"{"@effect":{"type":"x"}}"#).unwrap());
        assert_eq!(value.as_int(session.arena()), Some(2));
    }

    #[test]
    fn reset_clears_the_snapshot() {
        let mut session = Session::new();
        session.process_line(r#":let {"type":"x"} 1"#).unwrap();
        session.process_line(":reset").unwrap();
        let value = evaluated(session.process_line(r#"{"@effect":{"type":"x"}}"#).unwrap());
        assert!(value.is_signal(session.arena()));
    }

    #[test]
    fn malformed_lines_report_errors() {
        let mut session = Session::new();
        assert!(session.process_line("{oops").is_err());
        assert!(session.process_line(":nonsense").is_err());
        // A binding without its value argument is incomplete.
        assert!(session.process_line(r#":let {"type":"x"}"#).is_err());
    }
}
