//! Flexible duration grammar for wire payloads.
//!
//! Operator-facing durations accept three forms:
//!
//! - a bare number, interpreted as (possibly fractional) seconds: `15`, `0.5`
//! - a terse string with a unit suffix: `250ms`, `10s`, `2m`, `1h`, `1d`
//!   (a missing suffix means seconds)
//! - ISO-8601: `PT30S`, `PT2M30S`, `P1DT12H`
//!
//! Anything else is a parse error, which API layers surface as `400`.

use std::fmt;
use std::time::Duration;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DurationParseError {
    #[error("duration value is empty")]
    Empty,
    #[error("duration must not be negative: {0}")]
    Negative(String),
    #[error("invalid duration format: {0}")]
    Invalid(String),
    #[error("invalid ISO-8601 duration: {0}")]
    Iso(String),
}

/// A `Duration` that deserializes from the flexible grammar above.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct FlexDuration(pub Duration);

impl FlexDuration {
    pub fn as_duration(self) -> Duration {
        self.0
    }

    pub fn parse(raw: &str) -> Result<Duration, DurationParseError> {
        let value = raw.trim();
        if value.is_empty() {
            return Err(DurationParseError::Empty);
        }
        if value.starts_with('-') {
            return Err(DurationParseError::Negative(raw.to_string()));
        }
        if value.starts_with('P') || value.starts_with('p') {
            return parse_iso(value).ok_or_else(|| DurationParseError::Iso(raw.to_string()));
        }
        parse_terse(value).ok_or_else(|| DurationParseError::Invalid(raw.to_string()))
    }
}

impl From<Duration> for FlexDuration {
    fn from(value: Duration) -> Self {
        FlexDuration(value)
    }
}

impl From<FlexDuration> for Duration {
    fn from(value: FlexDuration) -> Self {
        value.0
    }
}

/// Upper bound that keeps `Duration::from_secs_f64` panic-free.
const MAX_SECONDS: f64 = 1e12;

fn duration_from_seconds(seconds: f64) -> Option<Duration> {
    if !seconds.is_finite() || !(0.0..=MAX_SECONDS).contains(&seconds) {
        return None;
    }
    Some(Duration::from_secs_f64(seconds))
}

/// `10s`, `250ms`, `1.5m`, bare `30` (seconds).
fn parse_terse(value: &str) -> Option<Duration> {
    let lower = value.to_ascii_lowercase();
    let digits_end = lower
        .find(|c: char| !c.is_ascii_digit() && c != '.')
        .unwrap_or(lower.len());
    let (number, unit) = lower.split_at(digits_end);
    let amount: f64 = number.parse().ok()?;
    let seconds = match unit {
        "" | "s" => amount,
        "ms" => amount / 1000.0,
        "m" => amount * 60.0,
        "h" => amount * 3600.0,
        "d" => amount * 86_400.0,
        _ => return None,
    };
    duration_from_seconds(seconds)
}

/// Subset of ISO-8601 durations: `P[nD][T[nH][nM][n[.n]S]]`.
fn parse_iso(value: &str) -> Option<Duration> {
    let upper = value.to_ascii_uppercase();
    let rest = upper.strip_prefix('P')?;
    let (date_part, time_part) = match rest.split_once('T') {
        Some((d, t)) => (d, Some(t)),
        None => (rest, None),
    };
    if date_part.is_empty() && time_part.is_none() {
        return None;
    }

    let mut seconds = 0.0_f64;
    seconds += parse_iso_fields(date_part, &[('D', 86_400.0)])?;
    if let Some(time) = time_part {
        if time.is_empty() {
            return None;
        }
        seconds += parse_iso_fields(time, &[('H', 3600.0), ('M', 60.0), ('S', 1.0)])?;
    }
    duration_from_seconds(seconds)
}

fn parse_iso_fields(mut input: &str, units: &[(char, f64)]) -> Option<f64> {
    let mut total = 0.0_f64;
    for &(designator, scale) in units {
        if input.is_empty() {
            break;
        }
        if let Some(pos) = input.find(designator) {
            let number: f64 = input[..pos].parse().ok()?;
            if !number.is_finite() || number < 0.0 {
                return None;
            }
            total += number * scale;
            input = &input[pos + 1..];
        }
    }
    if !input.is_empty() {
        return None;
    }
    Some(total)
}

impl Serialize for FlexDuration {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.0.as_secs_f64())
    }
}

impl<'de> Deserialize<'de> for FlexDuration {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(FlexDurationVisitor)
    }
}

struct FlexDurationVisitor;

impl<'de> Visitor<'de> for FlexDurationVisitor {
    type Value = FlexDuration;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a duration as seconds, a string like \"10s\", or ISO-8601")
    }

    fn visit_u64<E: de::Error>(self, value: u64) -> Result<Self::Value, E> {
        Ok(FlexDuration(Duration::from_secs(value)))
    }

    fn visit_i64<E: de::Error>(self, value: i64) -> Result<Self::Value, E> {
        if value < 0 {
            return Err(E::custom(DurationParseError::Negative(value.to_string())));
        }
        Ok(FlexDuration(Duration::from_secs(value as u64)))
    }

    fn visit_f64<E: de::Error>(self, value: f64) -> Result<Self::Value, E> {
        match duration_from_seconds(value) {
            Some(duration) => Ok(FlexDuration(duration)),
            None => Err(E::custom(DurationParseError::Invalid(value.to_string()))),
        }
    }

    fn visit_str<E: de::Error>(self, value: &str) -> Result<Self::Value, E> {
        FlexDuration::parse(value).map(FlexDuration).map_err(E::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_numbers_as_seconds() {
        assert_eq!(FlexDuration::parse("30").unwrap(), Duration::from_secs(30));
        assert_eq!(FlexDuration::parse("0.5").unwrap(), Duration::from_millis(500));
    }

    #[test]
    fn parses_terse_units() {
        assert_eq!(FlexDuration::parse("250ms").unwrap(), Duration::from_millis(250));
        assert_eq!(FlexDuration::parse("10s").unwrap(), Duration::from_secs(10));
        assert_eq!(FlexDuration::parse("2m").unwrap(), Duration::from_secs(120));
        assert_eq!(FlexDuration::parse("1h").unwrap(), Duration::from_secs(3600));
        assert_eq!(FlexDuration::parse("1d").unwrap(), Duration::from_secs(86_400));
        assert_eq!(FlexDuration::parse("1.5m").unwrap(), Duration::from_secs(90));
    }

    #[test]
    fn parses_iso_8601() {
        assert_eq!(FlexDuration::parse("PT30S").unwrap(), Duration::from_secs(30));
        assert_eq!(FlexDuration::parse("pt2m30s").unwrap(), Duration::from_secs(150));
        assert_eq!(
            FlexDuration::parse("P1DT12H").unwrap(),
            Duration::from_secs(86_400 + 12 * 3600)
        );
        assert_eq!(FlexDuration::parse("PT0.5S").unwrap(), Duration::from_millis(500));
    }

    #[test]
    fn rejects_garbage() {
        assert!(FlexDuration::parse("").is_err());
        assert!(FlexDuration::parse("-5s").is_err());
        assert!(FlexDuration::parse("10x").is_err());
        assert!(FlexDuration::parse("P").is_err());
        assert!(FlexDuration::parse("PT").is_err());
        assert!(FlexDuration::parse("soon").is_err());
    }

    #[test]
    fn deserializes_from_number_and_string() {
        let from_number: FlexDuration = serde_json::from_str("15").unwrap();
        assert_eq!(from_number.0, Duration::from_secs(15));
        let from_float: FlexDuration = serde_json::from_str("1.5").unwrap();
        assert_eq!(from_float.0, Duration::from_millis(1500));
        let from_string: FlexDuration = serde_json::from_str("\"90s\"").unwrap();
        assert_eq!(from_string.0, Duration::from_secs(90));
        let from_iso: FlexDuration = serde_json::from_str("\"PT1M\"").unwrap();
        assert_eq!(from_iso.0, Duration::from_secs(60));
    }

    #[test]
    fn rejects_invalid_wire_values() {
        assert!(serde_json::from_str::<FlexDuration>("\"nope\"").is_err());
        assert!(serde_json::from_str::<FlexDuration>("-3").is_err());
        assert!(serde_json::from_str::<FlexDuration>("true").is_err());
    }
}
