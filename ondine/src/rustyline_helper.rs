//! A collection of functions for interactive assistance during a toplevel session.

use std::borrow::Cow::{self, Borrowed, Owned};

use colored::Colorize;
use rustyline::completion::{Completer, Pair};
use rustyline::highlight::Highlighter;
use rustyline::hint::HistoryHinter;
use rustyline::validate::{ValidationContext, ValidationResult, Validator};
use rustyline::{Cmd, ConditionalEventHandler, Context, Event, EventContext, RepeatCount, Result};
use rustyline_derive::{Helper, Hinter};

/// Session commands that should be highlighted.
const COMMANDS: [&str; 4] = [":let", ":state", ":reset", ":quit"];

/// The bracket pairs JSON input balances. Parentheses never occur outside strings, so two pairs
/// cover the whole grammar.
const PAIRS: [(u8, u8); 2] = [(b'[', b']'), (b'{', b'}')];

/// An Helper for a `RustyLine` Editor that implements:
/// - a standard hinter;
/// - custom validator and highlighter.
#[derive(Helper, Hinter)]
pub struct RustyLineHelper {
    /// Whether colour is displayed
    color: bool,

    /// The hinter object
    #[rustyline(Hinter)]
    hinter: HistoryHinter,
}

impl RustyLineHelper {
    /// Creates a new helper
    #[must_use]
    pub fn new(color: bool) -> Self {
        Self { color, hinter: HistoryHinter {} }
    }
}

/// A Handler for the tab event
pub struct TabEventHandler;
impl ConditionalEventHandler for TabEventHandler {
    fn handle(&self, _: &Event, n: RepeatCount, _: bool, ctx: &EventContext) -> Option<Cmd> {
        if ctx.line().starts_with(':') {
            return None;
        }
        Some(Cmd::Insert(n, "  ".to_owned()))
    }
}

/// No completion: input is JSON, there is nothing useful to complete from the filesystem.
impl Completer for RustyLineHelper {
    type Candidate = Pair;

    fn complete(&self, _line: &str, _pos: usize, _ctx: &Context<'_>) -> Result<(usize, Vec<Pair>)> {
        Ok(Default::default())
    }
}

/// A JSON-aware variation of `MatchingBracketValidator`.
///
/// Commands validate immediately; expression lines stay open while brackets or quotes are
/// unbalanced so multi-line JSON can be entered.
impl Validator for RustyLineHelper {
    fn validate(&self, ctx: &mut ValidationContext) -> Result<ValidationResult> {
        if ctx.input().starts_with(':') {
            return Ok(ValidationResult::Valid(None));
        }
        Ok(validate_brackets(ctx.input()).unwrap_or(ValidationResult::Valid(None)))
    }
}

/// Verifies whether the given line(s) correspond to bracket-closed JSON.
///
/// The stack holds the closer each open bracket expects; brackets inside string literals do not
/// count.
fn validate_brackets(input: &str) -> Option<ValidationResult> {
    let mut expected = vec![];
    let mut in_string = false;
    let mut escaped = false;

    for &byte in input.as_bytes() {
        if in_string {
            match byte {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {},
            }
            continue;
        }
        if byte == b'"' {
            in_string = true;
            continue;
        }
        match bracket_role(byte) {
            Some(Bracket::Opens(closer)) => expected.push(closer),
            Some(Bracket::Closes) => match expected.pop() {
                Some(closer) if closer == byte => {},
                Some(_) => {
                    return Some(ValidationResult::Invalid(Some(format!(
                        "\nMismatched brackets: {} closes nothing here",
                        char::from(byte)
                    ))));
                },
                None => {
                    return Some(ValidationResult::Invalid(Some(format!(
                        "\nMismatched brackets: {} is unpaired",
                        char::from(byte)
                    ))));
                },
            },
            None => {},
        }
    }

    if expected.is_empty() && !in_string { None } else { Some(ValidationResult::Incomplete) }
}

/// A variation of `MatchingBracketHighlighter`, restricted to the JSON pairs, plus colouring of
/// the leading session command.
impl Highlighter for RustyLineHelper {
    fn highlight_hint<'input>(&self, hint: &'input str) -> Cow<'input, str> {
        if !self.color {
            return Owned(hint.to_owned());
        }
        Owned(format!("{}", hint.bright_black()))
    }

    fn highlight_char(&self, _line: &str, _pos: usize, _forced: bool) -> bool {
        self.color
    }

    fn highlight<'input>(&self, line: &'input str, pos: usize) -> Cow<'input, str> {
        if line.len() <= 1 || !self.color {
            return Borrowed(line);
        }
        let mut copy = line.to_owned();

        // The partner sits after the command prefix (if any), so colour it first and the
        // command's byte range stays valid.
        if let Some(offset) = partner_offset(line, pos) {
            let partner = String::from(char::from(line.as_bytes()[offset]));
            copy.replace_range(offset..=offset, &format!("{}", partner.blue().bold()));
        }
        if let Some(command) = leading_command(line) {
            copy.replace_range(..command.len(), &format!("{}", command.blue().bold()));
        }
        Owned(copy)
    }
}

/// What a byte means to the bracket balance.
enum Bracket {
    /// Opens a pair and expects this closer.
    Opens(u8),
    /// Closes whatever pair is innermost.
    Closes,
}

/// Classifies a byte against the JSON pair table.
fn bracket_role(byte: u8) -> Option<Bracket> {
    PAIRS.iter().find_map(|&(open, close)| {
        if byte == open {
            Some(Bracket::Opens(close))
        } else if byte == close {
            Some(Bracket::Closes)
        } else {
            None
        }
    })
}

/// The byte offset of the bracket paired with the one under the cursor, if any.
///
/// Scans forward from an opener and backward from a closer, counting nesting depth of the same
/// pair. String literals are not tracked here; the highlight is cosmetic and the validator owns
/// correctness.
fn partner_offset(line: &str, pos: usize) -> Option<usize> {
    let bytes = line.as_bytes();
    let byte = *bytes.get(pos)?;
    let (open, close) = PAIRS.iter().copied().find(|&(o, c)| byte == o || byte == c)?;
    let mut depth = 0_i32;
    if byte == open {
        for (offset, &candidate) in bytes.iter().enumerate().skip(pos) {
            if candidate == open {
                depth += 1;
            } else if candidate == close {
                depth -= 1;
                if depth == 0 {
                    return Some(offset);
                }
            }
        }
    } else {
        for offset in (0..=pos).rev() {
            if bytes[offset] == close {
                depth += 1;
            } else if bytes[offset] == open {
                depth -= 1;
                if depth == 0 {
                    return Some(offset);
                }
            }
        }
    }
    None
}

/// The session command opening the line, when it is one of [`COMMANDS`].
fn leading_command(line: &str) -> Option<&'static str> {
    COMMANDS.iter().copied().find(|&command| {
        line.strip_prefix(command)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with(char::is_whitespace))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partner_of_an_opener_is_found_forward() {
        assert_eq!(partner_offset("{\"a\": [1, 2]}", 0), Some(12));
        assert_eq!(partner_offset("{\"a\": [1, 2]}", 6), Some(11));
        assert_eq!(partner_offset("[[]]", 1), Some(2));
    }

    #[test]
    fn partner_of_a_closer_is_found_backward() {
        assert_eq!(partner_offset("{\"a\": [1, 2]}", 12), Some(0));
        assert_eq!(partner_offset("[[]]", 3), Some(0));
    }

    #[test]
    fn partner_lookup_handles_edge_positions() {
        assert_eq!(partner_offset("", 0), None);
        assert_eq!(partner_offset("[1, 2]", 6), None);
        assert_eq!(partner_offset("abc", 1), None);
        // An unclosed opener has no partner.
        assert_eq!(partner_offset("[1, 2", 0), None);
    }

    #[test]
    fn leading_commands_are_recognized_whole() {
        assert_eq!(leading_command(":state"), Some(":state"));
        assert_eq!(leading_command(":let {\"type\":\"x\"} 1"), Some(":let"));
        assert_eq!(leading_command(":lets 1"), None);
        assert_eq!(leading_command("{\"a\": 1}"), None);
    }

    #[test]
    fn incomplete_json_keeps_the_line_open() {
        assert!(matches!(validate_brackets("{\"a\": [1,"), Some(ValidationResult::Incomplete)));
        assert!(matches!(validate_brackets("\"unterminated"), Some(ValidationResult::Incomplete)));
        assert!(validate_brackets("{\"a\": [1, 2]}").is_none());
    }

    #[test]
    fn brackets_inside_strings_are_ignored() {
        assert!(validate_brackets("\"}{\"").is_none());
        assert!(validate_brackets("{\"key\": \"[\"}").is_none());
    }

    #[test]
    fn mismatched_brackets_are_invalid() {
        assert!(matches!(validate_brackets("[}"), Some(ValidationResult::Invalid(_))));
        assert!(matches!(validate_brackets("}"), Some(ValidationResult::Invalid(_))));
        assert!(matches!(validate_brackets("[{]}"), Some(ValidationResult::Invalid(_))));
    }
}
