//! Scalar term variants: nil, booleans, integers, floats, strings, symbols and timestamps.

use crate::memory::arena::Arena;
use crate::memory::term::{Payload, Term};

impl Term {
    /// The nil term.
    #[inline]
    #[must_use]
    pub fn nil(arena: &Arena) -> Self {
        arena.singletons.nil
    }

    /// A boolean term.
    #[inline]
    #[must_use]
    pub fn boolean(value: bool, arena: &Arena) -> Self {
        if value { arena.singletons.true_ } else { arena.singletons.false_ }
    }

    /// An integer term. Values in −1..=9 are preallocated singletons.
    #[must_use]
    pub fn int(value: i64, arena: &mut Arena) -> Self {
        if (-1..=9).contains(&value) {
            arena.singletons.integers[usize::try_from(value + 1).expect("singleton index")]
        } else {
            arena.intern(Payload::Int(value))
        }
    }

    /// A float term. Structural identity is bit identity: `NaN` equals itself.
    #[must_use]
    pub fn float(value: f64, arena: &mut Arena) -> Self {
        arena.intern(Payload::Float(value))
    }

    /// A string term. Content-addressed: equal content yields the same handle.
    #[must_use]
    pub fn string(content: &str, arena: &mut Arena) -> Self {
        Self::string_from_bytes(content.as_bytes(), arena)
    }

    /// A string term from raw UTF-8 bytes.
    #[must_use]
    pub fn string_from_bytes(content: &[u8], arena: &mut Arena) -> Self {
        if let Some(existing) = arena.find_interned_string(content) {
            return existing;
        }
        let text = arena.store_string(content);
        arena.insert_string(text)
    }

    /// A symbol term, identified by an opaque 32-bit id.
    #[must_use]
    pub fn symbol(id: u32, arena: &mut Arena) -> Self {
        arena.intern(Payload::Symbol(id))
    }

    /// A timestamp term, in milliseconds since the Unix epoch.
    #[must_use]
    pub fn timestamp(millis: i64, arena: &mut Arena) -> Self {
        arena.intern(Payload::Timestamp(millis))
    }

    /// A timestamp term parsed from ISO-8601 text through the host bindings.
    #[must_use]
    pub fn timestamp_from_text(text: &[u8], arena: &mut Arena) -> Option<Self> {
        let millis = arena.host().date_parse(text)?;
        Some(Self::timestamp(millis, arena))
    }

    // ------------------------------------------------------------------
    // Predicates and accessors.
    // ------------------------------------------------------------------

    #[must_use]
    pub fn is_nil(self, arena: &Arena) -> bool {
        matches!(arena.payload(self), Payload::Nil)
    }

    #[must_use]
    pub fn is_boolean(self, arena: &Arena) -> bool {
        matches!(arena.payload(self), Payload::Boolean(_))
    }

    #[must_use]
    pub fn is_int(self, arena: &Arena) -> bool {
        matches!(arena.payload(self), Payload::Int(_))
    }

    #[must_use]
    pub fn is_float(self, arena: &Arena) -> bool {
        matches!(arena.payload(self), Payload::Float(_))
    }

    #[must_use]
    pub fn is_string(self, arena: &Arena) -> bool {
        matches!(arena.payload(self), Payload::String(_))
    }

    #[must_use]
    pub fn is_symbol(self, arena: &Arena) -> bool {
        matches!(arena.payload(self), Payload::Symbol(_))
    }

    #[must_use]
    pub fn is_timestamp(self, arena: &Arena) -> bool {
        matches!(arena.payload(self), Payload::Timestamp(_))
    }

    #[must_use]
    pub fn as_bool(self, arena: &Arena) -> Option<bool> {
        match *arena.payload(self) {
            Payload::Boolean(value) => Some(value),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_int(self, arena: &Arena) -> Option<i64> {
        match *arena.payload(self) {
            Payload::Int(value) => Some(value),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_float(self, arena: &Arena) -> Option<f64> {
        match *arena.payload(self) {
            Payload::Float(value) => Some(value),
            _ => None,
        }
    }

    /// The numeric value of an int or float term, widened to a float.
    #[must_use]
    pub fn as_number(self, arena: &Arena) -> Option<f64> {
        match *arena.payload(self) {
            Payload::Int(value) => Some(value as f64),
            Payload::Float(value) => Some(value),
            _ => None,
        }
    }

    /// The raw bytes of a string term.
    #[must_use]
    pub fn string_bytes(self, arena: &Arena) -> Option<&[u8]> {
        match *arena.payload(self) {
            Payload::String(text) => Some(arena.bytes().bytes(text.address, text.len)),
            _ => None,
        }
    }

    /// The text of a string term. String terms always hold valid UTF-8.
    #[must_use]
    pub fn as_str(self, arena: &Arena) -> Option<&str> {
        self.string_bytes(arena).map(|bytes| std::str::from_utf8(bytes).expect("string term holds invalid UTF-8"))
    }

    #[must_use]
    pub fn symbol_id(self, arena: &Arena) -> Option<u32> {
        match *arena.payload(self) {
            Payload::Symbol(id) => Some(id),
            _ => None,
        }
    }

    #[must_use]
    pub fn timestamp_millis(self, arena: &Arena) -> Option<i64> {
        match *arena.payload(self) {
            Payload::Timestamp(millis) => Some(millis),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_accessors_round_trip() {
        let mut arena = Arena::new();
        assert_eq!(Term::int(37, &mut arena).as_int(&arena), Some(37));
        assert_eq!(Term::float(2.5, &mut arena).as_float(&arena), Some(2.5));
        assert_eq!(Term::boolean(true, &arena).as_bool(&arena), Some(true));
        assert_eq!(Term::string("bonjour", &mut arena).as_str(&arena), Some("bonjour"));
        assert_eq!(Term::symbol(99, &mut arena).symbol_id(&arena), Some(99));
        assert_eq!(Term::timestamp(1234, &mut arena).timestamp_millis(&arena), Some(1234));
    }

    #[test]
    fn accessors_reject_other_types() {
        let mut arena = Arena::new();
        let int = Term::int(37, &mut arena);
        assert_eq!(int.as_float(&arena), None);
        assert_eq!(int.as_str(&arena), None);
        assert_eq!(int.as_number(&arena), Some(37.0));
        assert!(int.is_int(&arena));
        assert!(!int.is_float(&arena));
    }

    #[test]
    fn small_integers_are_singletons() {
        let mut arena = Arena::new();
        let count = arena.term_count();
        for value in -1..=9 {
            Term::int(value, &mut arena);
        }
        assert_eq!(arena.term_count(), count);
    }

    #[test]
    fn empty_string_is_valid() {
        let mut arena = Arena::new();
        let empty = Term::string("", &mut arena);
        assert_eq!(empty.as_str(&arena), Some(""));
        assert_eq!(empty, Term::string("", &mut arena));
    }
}
