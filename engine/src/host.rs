//! Host-provided imports.
//!
//! The engine keeps a deliberately narrow dependency on its embedding: floating-point
//! transcendentals, date parsing and formatting, and a byte sink for debug output. Embedders
//! implement [`HostBindings`]; [`SystemHost`] is the standard-library implementation used by
//! default. Tests mock the trait to pin down exactly which imports a code path exercises.

use std::io::Write;

/// Milliseconds per day.
const DAY_MILLIS: i64 = 86_400_000;

/// The imports the engine requires from its embedding.
#[cfg_attr(test, mockall::automock)]
pub trait HostBindings {
    /// `base` raised to `exponent`.
    fn pow(&self, base: f64, exponent: f64) -> f64;

    /// Natural logarithm.
    fn log(&self, value: f64) -> f64;

    fn sin(&self, value: f64) -> f64;

    fn cos(&self, value: f64) -> f64;

    fn tan(&self, value: f64) -> f64;

    /// Parses ISO-8601 text into milliseconds since the Unix epoch, or nothing when malformed.
    fn date_parse(&self, text: &[u8]) -> Option<i64>;

    /// Formats milliseconds since the Unix epoch as ISO-8601 UTC, appending to `out` and
    /// returning the number of bytes written.
    fn date_format_iso(&self, millis: i64, out: &mut Vec<u8>) -> usize;

    /// Receives debug output bytes.
    fn write_debug(&self, bytes: &[u8]);
}

/// Standard-library implementation of the host imports.
pub struct SystemHost;

impl HostBindings for SystemHost {
    fn pow(&self, base: f64, exponent: f64) -> f64 {
        base.powf(exponent)
    }

    fn log(&self, value: f64) -> f64 {
        value.ln()
    }

    fn sin(&self, value: f64) -> f64 {
        value.sin()
    }

    fn cos(&self, value: f64) -> f64 {
        value.cos()
    }

    fn tan(&self, value: f64) -> f64 {
        value.tan()
    }

    fn date_parse(&self, text: &[u8]) -> Option<i64> {
        parse_iso(text)
    }

    fn date_format_iso(&self, millis: i64, out: &mut Vec<u8>) -> usize {
        let days = millis.div_euclid(DAY_MILLIS);
        let of_day = millis.rem_euclid(DAY_MILLIS);
        let (year, month, day) = civil_from_days(days);
        let (hour, minute) = (of_day / 3_600_000, of_day / 60_000 % 60);
        let (second, milli) = (of_day / 1000 % 60, of_day % 1000);
        let text =
            format!("{year:04}-{month:02}-{day:02}T{hour:02}:{minute:02}:{second:02}.{milli:03}Z");
        out.extend_from_slice(text.as_bytes());
        text.len()
    }

    fn write_debug(&self, bytes: &[u8]) {
        let _ = std::io::stderr().write_all(bytes);
    }
}

/// Gregorian date from days since the Unix epoch (Howard Hinnant's civil-calendar algorithm).
fn civil_from_days(days: i64) -> (i64, i64, i64) {
    let shifted = days + 719_468;
    let era = if shifted >= 0 { shifted } else { shifted - 146_096 } / 146_097;
    let day_of_era = shifted - era * 146_097;
    let year_of_era = (day_of_era - day_of_era / 1460 + day_of_era / 36_524 - day_of_era / 146_096) / 365;
    let year = year_of_era + era * 400;
    let day_of_year = day_of_era - (365 * year_of_era + year_of_era / 4 - year_of_era / 100);
    let month_index = (5 * day_of_year + 2) / 153;
    let day = day_of_year - (153 * month_index + 2) / 5 + 1;
    let month = if month_index < 10 { month_index + 3 } else { month_index - 9 };
    (if month <= 2 { year + 1 } else { year }, month, day)
}

/// Days since the Unix epoch from a Gregorian date; the inverse of [`civil_from_days`].
fn days_from_civil(year: i64, month: i64, day: i64) -> i64 {
    let year = if month <= 2 { year - 1 } else { year };
    let era = if year >= 0 { year } else { year - 399 } / 400;
    let year_of_era = year - era * 400;
    let day_of_year = (153 * (if month > 2 { month - 3 } else { month + 9 }) + 2) / 5 + day - 1;
    let day_of_era = year_of_era * 365 + year_of_era / 4 - year_of_era / 100 + day_of_year;
    era * 146_097 + day_of_era - 719_468
}

/// Parses `YYYY-MM-DD`, optionally followed by `THH:MM:SS`, `.mmm` and `Z`.
fn parse_iso(text: &[u8]) -> Option<i64> {
    fn digits(text: &[u8], range: std::ops::Range<usize>) -> Option<i64> {
        let slice = text.get(range)?;
        if slice.is_empty() || !slice.iter().all(u8::is_ascii_digit) {
            return None;
        }
        std::str::from_utf8(slice).ok()?.parse().ok()
    }

    let year = digits(text, 0..4)?;
    if text.get(4) != Some(&b'-') || text.get(7) != Some(&b'-') {
        return None;
    }
    let month = digits(text, 5..7)?;
    let day = digits(text, 8..10)?;
    if !(1..=12).contains(&month) || !(1..=31).contains(&day) {
        return None;
    }
    let mut millis = days_from_civil(year, month, day) * DAY_MILLIS;
    let mut offset = 10;
    if text.get(offset) == Some(&b'T') {
        if text.get(13) != Some(&b':') || text.get(16) != Some(&b':') {
            return None;
        }
        let hour = digits(text, 11..13)?;
        let minute = digits(text, 14..16)?;
        let second = digits(text, 17..19)?;
        if hour > 23 || minute > 59 || second > 59 {
            return None;
        }
        millis += ((hour * 60 + minute) * 60 + second) * 1000;
        offset = 19;
        if text.get(offset) == Some(&b'.') {
            millis += digits(text, offset + 1..offset + 4)?;
            offset += 4;
        }
    }
    if text.get(offset) == Some(&b'Z') {
        offset += 1;
    }
    (offset == text.len()).then_some(millis)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn epoch_formats_as_iso() {
        let mut out = Vec::new();
        let written = SystemHost.date_format_iso(0, &mut out);
        assert_eq!(out, b"1970-01-01T00:00:00.000Z");
        assert_eq!(written, out.len());
    }

    #[test]
    fn negative_timestamps_fall_before_the_epoch() {
        let mut out = Vec::new();
        SystemHost.date_format_iso(-DAY_MILLIS, &mut out);
        assert_eq!(out, b"1969-12-31T00:00:00.000Z");
    }

    #[test]
    fn parse_inverts_format() {
        for millis in [0, 1, 999, 1_234_567_890_123, -86_400_000, 253_402_300_799_000] {
            let mut out = Vec::new();
            SystemHost.date_format_iso(millis, &mut out);
            assert_eq!(SystemHost.date_parse(&out), Some(millis), "{}", String::from_utf8_lossy(&out));
        }
    }

    #[test]
    fn date_only_parses_to_midnight() {
        assert_eq!(SystemHost.date_parse(b"1970-01-02"), Some(DAY_MILLIS));
        assert_eq!(SystemHost.date_parse(b"2000-02-29"), Some(days_from_civil(2000, 2, 29) * DAY_MILLIS));
    }

    #[test]
    fn malformed_dates_are_rejected() {
        for text in [&b"1970"[..], b"1970-13-01", b"1970-01-32", b"1970-01-01T25:00:00", b"junk", b"1970-01-01x"] {
            assert_eq!(SystemHost.date_parse(text), None, "{}", String::from_utf8_lossy(text));
        }
    }

    #[test]
    fn civil_round_trips() {
        for days in [-719_468, -1, 0, 1, 365, 10_957, 2_932_896] {
            let (year, month, day) = civil_from_days(days);
            assert_eq!(days_from_civil(year, month, day), days);
        }
    }

    #[test]
    fn mocked_hosts_observe_calls() {
        let mut host = MockHostBindings::new();
        host.expect_pow().returning(|base, exponent| base * exponent);
        assert_eq!(host.pow(3.0, 4.0), 12.0);
    }
}
