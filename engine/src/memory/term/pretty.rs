//! Pretty-printing wrappers for terms.
//!
//! [`Term`] is the human rendering (scalars as literals, collections bracketed, meta-terms in
//! angle brackets); [`Detail`] is the lossless rendering that spells out variant names and
//! enough structure to reconstruct the term by eye. Both borrow the arena, so they are zero-cost
//! views suitable for `println!` and log lines.

use core::fmt::{Display, Formatter, Result, Write};

use crate::memory::arena::Arena;
use crate::memory::term::{Condition, Payload};

/// Human-readable rendering of a term.
#[derive(Clone, Copy)]
pub struct Term<'arena>(pub super::Term, pub &'arena Arena);

/// Lossless rendering of a term.
#[derive(Clone, Copy)]
pub struct Detail<'arena>(pub super::Term, pub &'arena Arena);

impl Display for Term<'_> {
    fn fmt(&self, f: &mut Formatter) -> Result {
        let Self(term, arena) = *self;
        match *arena.payload(term) {
            Payload::Nil => write!(f, "null"),
            Payload::Boolean(value) => write!(f, "{value}"),
            Payload::Int(value) => write!(f, "{value}"),
            Payload::Float(value) => write!(f, "{value:?}"),
            Payload::String(_) => write_quoted(f, term.as_str(arena).unwrap_or_default()),
            Payload::Symbol(id) => write!(f, "#{id}"),
            Payload::Timestamp(millis) => {
                let mut text = Vec::new();
                arena.host().date_format_iso(millis, &mut text);
                write!(f, "{}", String::from_utf8_lossy(&text))
            },
            Payload::List(items) => {
                f.write_char('[')?;
                for (index, item) in arena.items(items).enumerate() {
                    if index > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", Self(item, arena))?;
                }
                f.write_char(']')
            },
            Payload::Record { keys, values, .. } => {
                f.write_str("{ ")?;
                let keys = keys.list_items(arena);
                let values = values.list_items(arena);
                for (index, (key, value)) in keys.iter().zip(&values).enumerate() {
                    if index > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {}", Self(*key, arena), Self(*value, arena))?;
                }
                f.write_str(" }")
            },
            Payload::Hashmap(_) => {
                f.write_str("#{")?;
                for (index, (key, value)) in term.hashmap_entries(arena).into_iter().enumerate() {
                    if index > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {}", Self(key, arena), Self(value, arena))?;
                }
                f.write_char('}')
            },
            Payload::Hashset { .. } => {
                f.write_str("#[")?;
                for (index, element) in term.hashset_elements(arena).into_iter().enumerate() {
                    if index > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", Self(element, arena))?;
                }
                f.write_char(']')
            },
            Payload::Tree { .. } => {
                f.write_char('(')?;
                let mut first = true;
                let mut result = Ok(());
                term.walk_conditions(arena, &mut |condition| {
                    if result.is_ok() {
                        if !first {
                            result = f.write_str(" . ");
                        }
                        first = false;
                        if result.is_ok() {
                            result = write!(f, "{}", Self(condition, arena));
                        }
                    }
                });
                result?;
                f.write_char(')')
            },
            Payload::Builtin(id) => write!(f, "<builtin:{id}>"),
            Payload::Partial { target, args } => {
                write!(f, "<partial:{}{}>", Self(target, arena), Arguments(args, arena))
            },
            Payload::Lambda { arity, body } => write!(f, "λ{arity}.{}", Self(body, arena)),
            Payload::Variable(offset) => write!(f, "${offset}"),
            Payload::Let { initializer, body } => {
                write!(f, "let {} in {}", Self(initializer, arena), Self(body, arena))
            },
            Payload::Application { target, args } => {
                write!(f, "{}{}", Self(target, arena), Arguments(args, arena))
            },
            Payload::Condition(condition) => write_condition(f, condition, arena),
            Payload::Signal { conditions } => {
                f.write_str("<signal:")?;
                write!(f, "{}", Self(conditions, arena))?;
                f.write_char('>')
            },
            Payload::Effect { condition } => write!(f, "<effect:{}>", Self(condition, arena)),
            Payload::Constructor { keys } => write!(f, "<constructor:{}>", Self(keys, arena)),
            Payload::Cell(fields) => write!(f, "<cell:{}>", fields.len),
            Payload::Pointer { target } => match target {
                Some(target) => write!(f, "<pointer:{}>", Self(target, arena)),
                None => f.write_str("<pointer:null>"),
            },
            Payload::EmptyIterator => f.write_str("<iterator:empty>"),
            Payload::OnceIterator { .. } => f.write_str("<iterator:once>"),
            Payload::RepeatIterator { .. } => f.write_str("<iterator:repeat>"),
            Payload::RangeIterator { start, len } => write!(f, "<iterator:range {start}..+{len}>"),
            Payload::IntegersIterator => f.write_str("<iterator:integers>"),
            Payload::MapIterator { .. } => f.write_str("<iterator:map>"),
            Payload::FilterIterator { .. } => f.write_str("<iterator:filter>"),
            Payload::FlattenIterator { .. } => f.write_str("<iterator:flatten>"),
            Payload::ZipIterator { .. } => f.write_str("<iterator:zip>"),
            Payload::SkipIterator { .. } => f.write_str("<iterator:skip>"),
            Payload::TakeIterator { .. } => f.write_str("<iterator:take>"),
            Payload::EvaluateIterator { .. } => f.write_str("<iterator:evaluate>"),
            Payload::IntersperseIterator { .. } => f.write_str("<iterator:intersperse>"),
            Payload::KeysIterator { .. } => f.write_str("<iterator:keys>"),
            Payload::ValuesIterator { .. } => f.write_str("<iterator:values>"),
        }
    }
}

/// Parenthesized argument list of an application-like term.
#[derive(Clone, Copy)]
struct Arguments<'arena>(super::Term, &'arena Arena);

impl Display for Arguments<'_> {
    fn fmt(&self, f: &mut Formatter) -> Result {
        let Self(args, arena) = *self;
        f.write_char('(')?;
        for (index, arg) in args.list_items(arena).into_iter().enumerate() {
            if index > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", Term(arg, arena))?;
        }
        f.write_char(')')
    }
}

fn write_condition(f: &mut Formatter, condition: Condition, arena: &Arena) -> Result {
    match condition {
        Condition::Custom { effect_type, payload, .. } => {
            write!(f, "<custom:{}:{}>", Term(effect_type, arena), Term(payload, arena))
        },
        Condition::Pending => f.write_str("<pending>"),
        Condition::Error { payload } => write!(f, "<error:{}>", Term(payload, arena)),
        Condition::TypeError { expected, received } => {
            write!(f, "<type-error:expected {expected}, got {}>", Term(received, arena))
        },
        Condition::InvalidFunctionTarget { target } => {
            write!(f, "<invalid-function-target:{}>", Term(target, arena))
        },
        Condition::InvalidFunctionArgs { target, args } => {
            write!(f, "<invalid-function-args:{}{}>", Term(target, arena), Arguments(args, arena))
        },
        Condition::InvalidPointer => f.write_str("<invalid-pointer>"),
    }
}

fn write_quoted(f: &mut Formatter, text: &str) -> Result {
    f.write_char('"')?;
    for character in text.chars() {
        match character {
            '"' => f.write_str("\\\"")?,
            '\\' => f.write_str("\\\\")?,
            '\n' => f.write_str("\\n")?,
            '\t' => f.write_str("\\t")?,
            '\r' => f.write_str("\\r")?,
            _ => f.write_char(character)?,
        }
    }
    f.write_char('"')
}

impl Display for Detail<'_> {
    fn fmt(&self, f: &mut Formatter) -> Result {
        let Self(term, arena) = *self;
        let tag = term.type_tag(arena);
        match *arena.payload(term) {
            Payload::Nil | Payload::EmptyIterator | Payload::IntegersIterator => write!(f, "{tag}"),
            Payload::Boolean(value) => write!(f, "{tag}({value})"),
            Payload::Int(value) | Payload::Timestamp(value) => write!(f, "{tag}({value})"),
            Payload::Float(value) => write!(f, "{tag}({value:?})"),
            Payload::String(_) => {
                write!(f, "{tag}(")?;
                write_quoted(f, term.as_str(arena).unwrap_or_default())?;
                f.write_char(')')
            },
            Payload::Symbol(id) => write!(f, "{tag}({id})"),
            Payload::Variable(offset) => write!(f, "{tag}({offset})"),
            Payload::Builtin(id) => write!(f, "{tag}({id})"),
            Payload::Lambda { arity, body } => write!(f, "{tag}({arity}, {})", Self(body, arena)),
            Payload::List(items) => {
                write!(f, "{tag}[")?;
                for (index, item) in arena.items(items).enumerate() {
                    if index > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", Self(item, arena))?;
                }
                f.write_char(']')
            },
            Payload::Record { keys, values, .. } => {
                write!(f, "{tag}(keys: {}, values: {})", Self(keys, arena), Self(values, arena))
            },
            Payload::Hashmap(buckets) => write!(f, "{tag}(entries: {})", buckets.entries),
            Payload::Hashset { entries } => write!(f, "{tag}({})", Self(entries, arena)),
            Payload::Tree { left, right, len } => {
                write!(f, "{tag}(len: {len}, left: ")?;
                write_option(f, left, arena)?;
                f.write_str(", right: ")?;
                write_option(f, right, arena)?;
                f.write_char(')')
            },
            Payload::Partial { target, args } | Payload::Application { target, args } => {
                write!(f, "{tag}(target: {}, args: {})", Self(target, arena), Self(args, arena))
            },
            Payload::Let { initializer, body } => {
                write!(f, "{tag}(initializer: {}, body: {})", Self(initializer, arena), Self(body, arena))
            },
            Payload::Condition(condition) => {
                write!(f, "{tag}(tag: {}, ", condition.tag())?;
                write_condition(f, condition, arena)?;
                f.write_char(')')
            },
            Payload::Signal { conditions } => write!(f, "{tag}({})", Self(conditions, arena)),
            Payload::Effect { condition } => write!(f, "{tag}({})", Self(condition, arena)),
            Payload::Constructor { keys } => write!(f, "{tag}({})", Self(keys, arena)),
            Payload::Cell(fields) => write!(f, "{tag}(fields: {})", fields.len),
            Payload::Pointer { target } => {
                write!(f, "{tag}(")?;
                write_option(f, target, arena)?;
                f.write_char(')')
            },
            Payload::OnceIterator { value } | Payload::RepeatIterator { value } => {
                write!(f, "{tag}({})", Self(value, arena))
            },
            Payload::RangeIterator { start, len } => write!(f, "{tag}({start}, {len})"),
            Payload::MapIterator { source, transform } => {
                write!(f, "{tag}(source: {}, transform: {})", Self(source, arena), Self(transform, arena))
            },
            Payload::FilterIterator { source, predicate } => {
                write!(f, "{tag}(source: {}, predicate: {})", Self(source, arena), Self(predicate, arena))
            },
            Payload::FlattenIterator { source }
            | Payload::EvaluateIterator { source }
            | Payload::KeysIterator { source }
            | Payload::ValuesIterator { source } => write!(f, "{tag}({})", Self(source, arena)),
            Payload::ZipIterator { left, right } => {
                write!(f, "{tag}(left: {}, right: {})", Self(left, arena), Self(right, arena))
            },
            Payload::SkipIterator { source, count } | Payload::TakeIterator { source, count } => {
                write!(f, "{tag}(source: {}, count: {count})", Self(source, arena))
            },
            Payload::IntersperseIterator { source, separator } => {
                write!(f, "{tag}(source: {}, separator: {})", Self(source, arena), Self(separator, arena))
            },
        }
    }
}

fn write_option(f: &mut Formatter, term: Option<super::Term>, arena: &Arena) -> Result {
    match term {
        Some(term) => write!(f, "{}", Detail(term, arena)),
        None => f.write_str("null"),
    }
}
