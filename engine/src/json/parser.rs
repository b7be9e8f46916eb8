//! A recursive-descent JSON parser producing terms.
//!
//! Arrays become lists, objects become records (field order preserved), numbers become integers
//! when written integrally and floats otherwise, strings decode every escape including surrogate
//! pairs. Errors carry the byte offset the parse stopped at.

use crate::error::{Error, Result};
use crate::json::ErrorKind;
use crate::memory::arena::Arena;
use crate::memory::term::Term;

/// Parses one JSON value, tolerating surrounding whitespace.
///
/// # Errors
/// Yields the [`ErrorKind`] and byte offset at which the input stopped being valid JSON.
pub fn parse(text: &str, arena: &mut Arena) -> Result<Term> {
    let (value, consumed) = parse_prefix(text, arena)?;
    let mut parser = Parser { bytes: text.as_bytes(), offset: consumed };
    parser.skip_whitespace();
    if parser.offset != parser.bytes.len() {
        return Err(Error::from(ErrorKind::TrailingCharacters(parser.offset)));
    }
    Ok(value)
}

/// Parses the first JSON value of the input, returning the term together with the byte offset
/// one past it. The remainder of the input is left for the caller.
///
/// # Errors
/// Yields the [`ErrorKind`] and byte offset at which the input stopped being valid JSON.
pub fn parse_prefix(text: &str, arena: &mut Arena) -> Result<(Term, usize)> {
    let mut parser = Parser { bytes: text.as_bytes(), offset: 0 };
    parser.skip_whitespace();
    let value = parser.value(arena)?;
    Ok((value, parser.offset))
}

struct Parser<'input> {
    bytes: &'input [u8],
    offset: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.offset).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let byte = self.peek()?;
        self.offset += 1;
        Some(byte)
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\t' | b'\n' | b'\r')) {
            self.offset += 1;
        }
    }

    fn expect(&mut self, expected: u8) -> Result<()> {
        match self.peek() {
            Some(byte) if byte == expected => {
                self.offset += 1;
                Ok(())
            },
            Some(_) => Err(Error::from(ErrorKind::UnexpectedCharacter(self.offset))),
            None => Err(Error::from(ErrorKind::UnexpectedEnd(self.offset))),
        }
    }

    fn expect_literal(&mut self, literal: &[u8]) -> Result<()> {
        for &expected in literal {
            self.expect(expected)?;
        }
        Ok(())
    }

    fn value(&mut self, arena: &mut Arena) -> Result<Term> {
        match self.peek() {
            None => Err(Error::from(ErrorKind::UnexpectedEnd(self.offset))),
            Some(b'n') => {
                self.expect_literal(b"null")?;
                Ok(Term::nil(arena))
            },
            Some(b't') => {
                self.expect_literal(b"true")?;
                Ok(Term::boolean(true, arena))
            },
            Some(b'f') => {
                self.expect_literal(b"false")?;
                Ok(Term::boolean(false, arena))
            },
            Some(b'"') => self.string(arena),
            Some(b'[') => self.array(arena),
            Some(b'{') => self.object(arena),
            Some(b'-' | b'0'..=b'9') => self.number(arena),
            Some(_) => Err(Error::from(ErrorKind::UnexpectedCharacter(self.offset))),
        }
    }

    fn array(&mut self, arena: &mut Arena) -> Result<Term> {
        self.expect(b'[')?;
        let mut items = Vec::new();
        self.skip_whitespace();
        if self.peek() == Some(b']') {
            self.offset += 1;
            return Ok(Term::empty_list(arena));
        }
        loop {
            self.skip_whitespace();
            items.push(self.value(arena)?);
            self.skip_whitespace();
            match self.bump() {
                Some(b',') => {},
                Some(b']') => return Ok(Term::list(&items, arena)),
                Some(_) => return Err(Error::from(ErrorKind::UnexpectedCharacter(self.offset - 1))),
                None => return Err(Error::from(ErrorKind::UnexpectedEnd(self.offset))),
            }
        }
    }

    fn object(&mut self, arena: &mut Arena) -> Result<Term> {
        self.expect(b'{')?;
        let mut keys = Vec::new();
        let mut values = Vec::new();
        self.skip_whitespace();
        if self.peek() == Some(b'}') {
            self.offset += 1;
            return Ok(Term::empty_record(arena));
        }
        loop {
            self.skip_whitespace();
            keys.push(self.string(arena)?);
            self.skip_whitespace();
            self.expect(b':')?;
            self.skip_whitespace();
            values.push(self.value(arena)?);
            self.skip_whitespace();
            match self.bump() {
                Some(b',') => {},
                Some(b'}') => return Ok(Term::record(&keys, &values, arena)),
                Some(_) => return Err(Error::from(ErrorKind::UnexpectedCharacter(self.offset - 1))),
                None => return Err(Error::from(ErrorKind::UnexpectedEnd(self.offset))),
            }
        }
    }

    fn number(&mut self, arena: &mut Arena) -> Result<Term> {
        let start = self.offset;
        if self.peek() == Some(b'-') {
            self.offset += 1;
        }
        let digits_start = self.offset;
        while matches!(self.peek(), Some(b'0'..=b'9')) {
            self.offset += 1;
        }
        if self.offset == digits_start {
            return Err(Error::from(ErrorKind::InvalidNumber(start)));
        }
        let mut integral = true;
        if self.peek() == Some(b'.') {
            integral = false;
            self.offset += 1;
            let fraction_start = self.offset;
            while matches!(self.peek(), Some(b'0'..=b'9')) {
                self.offset += 1;
            }
            if self.offset == fraction_start {
                return Err(Error::from(ErrorKind::InvalidNumber(start)));
            }
        }
        if matches!(self.peek(), Some(b'e' | b'E')) {
            integral = false;
            self.offset += 1;
            if matches!(self.peek(), Some(b'+' | b'-')) {
                self.offset += 1;
            }
            let exponent_start = self.offset;
            while matches!(self.peek(), Some(b'0'..=b'9')) {
                self.offset += 1;
            }
            if self.offset == exponent_start {
                return Err(Error::from(ErrorKind::InvalidNumber(start)));
            }
        }
        let text = std::str::from_utf8(&self.bytes[start..self.offset])
            .map_err(|_| Error::from(ErrorKind::InvalidNumber(start)))?;
        if integral {
            if let Ok(value) = text.parse::<i64>() {
                return Ok(Term::int(value, arena));
            }
        }
        text.parse::<f64>()
            .map(|value| Term::float(value, arena))
            .map_err(|_| Error::from(ErrorKind::InvalidNumber(start)))
    }

    fn string(&mut self, arena: &mut Arena) -> Result<Term> {
        self.expect(b'"')?;
        let mut decoded = Vec::new();
        loop {
            let offset = self.offset;
            match self.bump() {
                None => return Err(Error::from(ErrorKind::UnexpectedEnd(self.offset))),
                Some(b'"') => return Ok(Term::string_from_bytes(&decoded, arena)),
                Some(b'\\') => self.escape(&mut decoded)?,
                Some(byte) if byte < 0x20 => {
                    return Err(Error::from(ErrorKind::UnexpectedCharacter(offset)));
                },
                Some(byte) => decoded.push(byte),
            }
        }
    }

    fn escape(&mut self, decoded: &mut Vec<u8>) -> Result<()> {
        let offset = self.offset - 1;
        match self.bump() {
            None => Err(Error::from(ErrorKind::UnexpectedEnd(self.offset))),
            Some(b'"') => {
                decoded.push(b'"');
                Ok(())
            },
            Some(b'\\') => {
                decoded.push(b'\\');
                Ok(())
            },
            Some(b'/') => {
                decoded.push(b'/');
                Ok(())
            },
            Some(b'b') => {
                decoded.push(0x08);
                Ok(())
            },
            Some(b'f') => {
                decoded.push(0x0c);
                Ok(())
            },
            Some(b'n') => {
                decoded.push(b'\n');
                Ok(())
            },
            Some(b'r') => {
                decoded.push(b'\r');
                Ok(())
            },
            Some(b't') => {
                decoded.push(b'\t');
                Ok(())
            },
            Some(b'u') => {
                let unit = self.hex_unit(offset)?;
                let character = if (0xd800..0xdc00).contains(&unit) {
                    // A high surrogate must be followed by an escaped low surrogate; together
                    // they decode to one supplementary-plane character.
                    if self.bump() != Some(b'\\') || self.bump() != Some(b'u') {
                        return Err(Error::from(ErrorKind::InvalidEscape(offset)));
                    }
                    let low = self.hex_unit(offset)?;
                    if !(0xdc00..0xe000).contains(&low) {
                        return Err(Error::from(ErrorKind::InvalidEscape(offset)));
                    }
                    let code = 0x10000 + ((unit - 0xd800) << 10) + (low - 0xdc00);
                    char::from_u32(code).ok_or(Error::from(ErrorKind::InvalidEscape(offset)))?
                } else {
                    char::from_u32(unit).ok_or(Error::from(ErrorKind::InvalidEscape(offset)))?
                };
                let mut buffer = [0_u8; 4];
                decoded.extend_from_slice(character.encode_utf8(&mut buffer).as_bytes());
                Ok(())
            },
            Some(_) => Err(Error::from(ErrorKind::InvalidEscape(offset))),
        }
    }

    fn hex_unit(&mut self, escape_offset: usize) -> Result<u32> {
        let mut unit = 0;
        for _ in 0..4 {
            let digit = match self.bump() {
                Some(byte @ b'0'..=b'9') => u32::from(byte - b'0'),
                Some(byte @ b'a'..=b'f') => u32::from(byte - b'a' + 10),
                Some(byte @ b'A'..=b'F') => u32::from(byte - b'A' + 10),
                _ => return Err(Error::from(ErrorKind::InvalidEscape(escape_offset))),
            };
            unit = unit * 16 + digit;
        }
        Ok(unit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kind(result: Result<Term>) -> ErrorKind {
        match result {
            Err(Error::Json(kind)) => kind,
            other => panic!("expected a json error, got {other:?}"),
        }
    }

    #[test]
    fn scalars_parse() {
        let mut arena = Arena::new();
        assert!(parse("null", &mut arena).unwrap().is_nil(&arena));
        assert_eq!(parse("true", &mut arena).unwrap().as_bool(&arena), Some(true));
        assert_eq!(parse("false", &mut arena).unwrap().as_bool(&arena), Some(false));
        assert_eq!(parse("42", &mut arena).unwrap().as_int(&arena), Some(42));
        assert_eq!(parse("-7", &mut arena).unwrap().as_int(&arena), Some(-7));
        assert_eq!(parse("2.5", &mut arena).unwrap().as_float(&arena), Some(2.5));
        assert_eq!(parse("1e3", &mut arena).unwrap().as_float(&arena), Some(1000.0));
        assert_eq!(parse("\"hello\"", &mut arena).unwrap().as_str(&arena), Some("hello"));
    }

    #[test]
    fn whitespace_is_tolerated() {
        let mut arena = Arena::new();
        let value = parse("  \n\t[ 1 , 2 ]\r\n ", &mut arena).unwrap();
        assert_eq!(value.list_len(&arena), Some(2));
    }

    #[test]
    fn arrays_become_lists() {
        let mut arena = Arena::new();
        let value = parse("[1,[2,3],[]]", &mut arena).unwrap();
        assert_eq!(value.list_len(&arena), Some(3));
        assert_eq!(value.list_item(2, &arena), Some(Term::empty_list(&arena)));
        let inner = value.list_item(1, &arena).unwrap();
        assert_eq!(inner.list_len(&arena), Some(2));
    }

    #[test]
    fn objects_become_records_in_order() {
        let mut arena = Arena::new();
        let value = parse("{\"b\":1,\"a\":2}", &mut arena).unwrap();
        assert!(value.is_record(&arena));
        let keys = value.record_keys(&arena).unwrap().list_items(&arena);
        assert_eq!(keys[0].as_str(&arena), Some("b"));
        assert_eq!(keys[1].as_str(&arena), Some("a"));
        let key = Term::string("a", &mut arena);
        let two = Term::int(2, &mut arena);
        assert_eq!(value.record_get(key, &arena), Some(two));
    }

    #[test]
    fn escapes_decode() {
        let mut arena = Arena::new();
        let value = parse(r#""a\"b\\c\/d\n\tA""#, &mut arena).unwrap();
        assert_eq!(value.as_str(&arena), Some("a\"b\\c/d\n\tA"));
    }

    #[test]
    fn surrogate_pairs_decode_to_utf8() {
        let mut arena = Arena::new();
        let value = parse(r#""\ud83d\ude00""#, &mut arena).unwrap();
        assert_eq!(value.as_str(&arena), Some("\u{1f600}"));
        // One supplementary-plane character is a single four-byte sequence.
        assert_eq!(value.string_bytes(&arena).map(<[u8]>::len), Some(4));

        // The escaped and literal spellings intern to the same handle.
        let raw = parse("\"\u{1f600}\"", &mut arena).unwrap();
        assert_eq!(raw, value);
    }

    #[test]
    fn lone_surrogates_are_invalid() {
        let mut arena = Arena::new();
        assert!(matches!(kind(parse(r#""\ud83d""#, &mut arena)), ErrorKind::InvalidEscape(_)));
        assert!(matches!(kind(parse(r#""\ud83dA""#, &mut arena)), ErrorKind::InvalidEscape(_)));
    }

    #[test]
    fn errors_carry_the_failing_offset() {
        let mut arena = Arena::new();
        assert_eq!(kind(parse("", &mut arena)), ErrorKind::UnexpectedEnd(0));
        assert_eq!(kind(parse("[1,", &mut arena)), ErrorKind::UnexpectedEnd(3));
        assert_eq!(kind(parse("  x", &mut arena)), ErrorKind::UnexpectedCharacter(2));
        assert_eq!(kind(parse("1 2", &mut arena)), ErrorKind::TrailingCharacters(2));
        assert_eq!(kind(parse("-", &mut arena)), ErrorKind::InvalidNumber(0));
        assert_eq!(kind(parse("1.", &mut arena)), ErrorKind::InvalidNumber(0));
    }

    #[test]
    fn prefix_parsing_reports_the_consumed_length() {
        let mut arena = Arena::new();
        let text = r#"  {"a":1} 42"#;
        let (value, consumed) = parse_prefix(text, &mut arena).unwrap();
        assert!(value.is_record(&arena));
        assert_eq!(parse(&text[consumed..], &mut arena).unwrap().as_int(&arena), Some(42));

        // A lone value consumes everything up to the trailing whitespace.
        let (value, consumed) = parse_prefix("true ", &mut arena).unwrap();
        assert_eq!(value.as_bool(&arena), Some(true));
        assert_eq!(consumed, 4);
    }

    #[test]
    fn huge_integral_numbers_fall_back_to_floats() {
        let mut arena = Arena::new();
        let value = parse("123456789012345678901234567890", &mut arena).unwrap();
        assert!(value.is_float(&arena));
    }
}
