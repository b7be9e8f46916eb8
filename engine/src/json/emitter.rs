//! The JSON emitter: terms to minimal JSON text.
//!
//! Records serialize as objects (string keys required), lists as arrays, scalars per JSON
//! conventions. Non-finite floats have no JSON spelling and emit `null`; timestamps emit their
//! ISO-8601 rendering as a string. Everything else is reported as unserializable so callers can
//! locate the offending subtree.

use crate::error::{Error, Result};
use crate::json::ErrorKind;
use crate::memory::arena::Arena;
use crate::memory::term::{Payload, Term};

/// Serializes a term as JSON, appending to `out`.
///
/// # Errors
/// Names the term variant that has no JSON representation; `out` may hold a partial prefix.
pub fn to_json(term: Term, arena: &Arena, out: &mut String) -> Result<()> {
    match *arena.payload(term) {
        Payload::Nil => {
            out.push_str("null");
            Ok(())
        },
        Payload::Boolean(value) => {
            out.push_str(if value { "true" } else { "false" });
            Ok(())
        },
        Payload::Int(value) => {
            out.push_str(&value.to_string());
            Ok(())
        },
        Payload::Float(value) => {
            // NaN and the infinities have no JSON spelling.
            if value.is_finite() {
                out.push_str(&format!("{value:?}"));
            } else {
                out.push_str("null");
            }
            Ok(())
        },
        Payload::String(_) => {
            write_string(term.as_str(arena).unwrap_or_default(), out);
            Ok(())
        },
        Payload::Timestamp(millis) => {
            let mut text = Vec::new();
            arena.host().date_format_iso(millis, &mut text);
            write_string(&String::from_utf8_lossy(&text), out);
            Ok(())
        },
        Payload::List(items) => {
            out.push('[');
            for (index, item) in arena.items(items).enumerate().collect::<Vec<_>>() {
                if index > 0 {
                    out.push(',');
                }
                to_json(item, arena, out)?;
            }
            out.push(']');
            Ok(())
        },
        Payload::Record { keys, values, .. } => {
            out.push('{');
            let keys = keys.list_items(arena);
            let values = values.list_items(arena);
            for (index, (key, value)) in keys.into_iter().zip(values).enumerate() {
                if index > 0 {
                    out.push(',');
                }
                let Some(key) = key.as_str(arena) else {
                    return Err(Error::from(ErrorKind::Unserializable(key.type_tag(arena))));
                };
                write_string(key, out);
                out.push(':');
                to_json(value, arena, out)?;
            }
            out.push('}');
            Ok(())
        },
        _ => Err(Error::from(ErrorKind::Unserializable(term.type_tag(arena)))),
    }
}

/// Serializes a term as a fresh JSON string.
///
/// # Errors
/// See [`to_json`].
pub fn to_json_string(term: Term, arena: &Arena) -> Result<String> {
    let mut out = String::new();
    to_json(term, arena, &mut out)?;
    Ok(out)
}

fn write_string(text: &str, out: &mut String) {
    out.push('"');
    for character in text.chars() {
        match character {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            control if (control as u32) < 0x20 => {
                out.push_str(&format!("\\u{:04x}", control as u32));
            },
            character => out.push(character),
        }
    }
    out.push('"');
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::json::parse;

    fn emit(term: Term, arena: &Arena) -> String {
        to_json_string(term, arena).unwrap()
    }

    #[test]
    fn output_is_minimal() {
        let mut arena = Arena::new();
        let key = Term::string("k", &mut arena);
        let one = Term::int(1, &mut arena);
        let half = Term::float(0.5, &mut arena);
        let items = Term::list(&[one, half], &mut arena);
        let record = Term::record(&[key], &[items], &mut arena);
        assert_eq!(emit(record, &arena), r#"{"k":[1,0.5]}"#);
    }

    #[test]
    fn integral_floats_keep_their_point() {
        let mut arena = Arena::new();
        let value = Term::float(1.0, &mut arena);
        assert_eq!(emit(value, &arena), "1.0");
    }

    #[test]
    fn non_finite_floats_emit_null() {
        let mut arena = Arena::new();
        for value in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let term = Term::float(value, &mut arena);
            assert_eq!(emit(term, &arena), "null");
        }
    }

    #[test]
    fn strings_escape_controls_and_quotes() {
        let mut arena = Arena::new();
        let value = Term::string("a\"b\\c\nd\u{1}", &mut arena);
        assert_eq!(emit(value, &arena), r#""a\"b\\c\nd\u0001""#);
    }

    #[test]
    fn timestamps_emit_iso_strings() {
        let mut arena = Arena::new();
        let value = Term::timestamp(0, &mut arena);
        assert_eq!(emit(value, &arena), "\"1970-01-01T00:00:00.000Z\"");
    }

    #[test]
    fn unserializable_subtrees_are_reported() {
        let mut arena = Arena::new();
        let lambda = {
            let body = Term::variable(0, &mut arena);
            Term::lambda(1, body, &mut arena)
        };
        assert!(to_json_string(lambda, &arena).is_err());

        let nested = Term::list(&[lambda], &mut arena);
        assert!(to_json_string(nested, &arena).is_err());

        let signal = Term::pending_signal(&arena);
        assert!(to_json_string(signal, &arena).is_err());
    }

    #[test]
    fn round_trip_preserves_representable_terms() {
        let mut arena = Arena::new();
        for text in [
            "null",
            "true",
            "[1,2,3]",
            r#"{"a":1,"b":[true,null],"c":{"d":"e"}}"#,
            r#""smile 😀""#,
            "0.125",
            "-42",
        ] {
            let term = parse(text, &mut arena).unwrap();
            let emitted = emit(term, &arena);
            let reparsed = parse(&emitted, &mut arena).unwrap();
            assert!(term.equals(reparsed, &arena), "{text} -> {emitted}");
        }
    }

    #[test]
    fn output_parses_under_a_reference_parser() {
        let mut arena = Arena::new();
        let text = r#"{"nested":[1,2.5,"x\ny",{"deep":null}],"ok":true}"#;
        let term = parse(text, &mut arena).unwrap();
        let emitted = emit(term, &arena);
        let oracle: serde_json::Value = serde_json::from_str(&emitted).unwrap();
        let original: serde_json::Value = serde_json::from_str(text).unwrap();
        assert_eq!(oracle, original);
    }
}
