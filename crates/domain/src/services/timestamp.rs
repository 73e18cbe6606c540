//! Timestamp normalization for incoming fixes.
//!
//! Devices report time in several shapes. Accepted forms, tried in order:
//! 1. UNIX epoch as a number or numeric string. Values at or above `1e11`
//!    are milliseconds, smaller values are seconds.
//! 2. RFC 3339 / ISO-8601 with `Z` or an explicit offset.
//! 3. `YYYY-MM-DD HH:MM:SS` (optionally with fractional seconds), read as UTC.
//!
//! Everything is truncated to whole seconds.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde_json::Value;
use thiserror::Error;

/// Epoch values at or above this are interpreted as milliseconds.
pub const EPOCH_MILLIS_THRESHOLD: f64 = 1e11;

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M:%S%.f"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimestampError {
    #[error("empty timestamp")]
    Empty,

    #[error("unrecognized timestamp format: {0}")]
    Unrecognized(String),

    #[error("timestamp out of range: {0}")]
    OutOfRange(String),
}

/// Parses a JSON timestamp value.
pub fn parse_timestamp(value: &Value) -> Result<DateTime<Utc>, TimestampError> {
    match value {
        Value::Number(n) => match n.as_f64() {
            Some(f) => from_epoch(f),
            None => Err(TimestampError::Unrecognized(n.to_string())),
        },
        Value::String(s) => parse_timestamp_str(s),
        Value::Null => Err(TimestampError::Empty),
        other => Err(TimestampError::Unrecognized(other.to_string())),
    }
}

/// Parses a textual timestamp.
pub fn parse_timestamp_str(raw: &str) -> Result<DateTime<Utc>, TimestampError> {
    let s = raw.trim();
    if s.is_empty() {
        return Err(TimestampError::Empty);
    }

    if let Ok(epoch) = s.parse::<f64>() {
        return from_epoch(epoch);
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return truncate(dt.with_timezone(&Utc));
    }

    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return truncate(Utc.from_utc_datetime(&naive));
        }
    }

    Err(TimestampError::Unrecognized(s.to_string()))
}

/// Converts an epoch value in seconds or milliseconds.
pub fn from_epoch(value: f64) -> Result<DateTime<Utc>, TimestampError> {
    if !value.is_finite() || value < 0.0 {
        return Err(TimestampError::OutOfRange(value.to_string()));
    }
    let secs = if value >= EPOCH_MILLIS_THRESHOLD {
        value / 1000.0
    } else {
        value
    };
    Utc.timestamp_opt(secs.trunc() as i64, 0)
        .single()
        .ok_or_else(|| TimestampError::OutOfRange(value.to_string()))
}

fn truncate(dt: DateTime<Utc>) -> Result<DateTime<Utc>, TimestampError> {
    Utc.timestamp_opt(dt.timestamp(), 0)
        .single()
        .ok_or_else(|| TimestampError::OutOfRange(dt.to_rfc3339()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn expected() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 8, 10, 12, 34, 56).unwrap()
    }

    #[test]
    fn test_all_accepted_forms_agree() {
        let inputs = [
            json!(1723293296),
            json!(1723293296000_i64),
            json!("2024-08-10T12:34:56Z"),
            json!("2024-08-10T12:34:56+00:00"),
            json!("2024-08-10 12:34:56"),
        ];
        for input in inputs {
            assert_eq!(parse_timestamp(&input).unwrap(), expected(), "{input}");
        }
    }

    #[test]
    fn test_numeric_strings_are_epochs() {
        assert_eq!(parse_timestamp_str("1723293296").unwrap(), expected());
        assert_eq!(parse_timestamp_str("1723293296000").unwrap(), expected());
        assert_eq!(parse_timestamp_str(" 1723293296.75 ").unwrap(), expected());
    }

    #[test]
    fn test_explicit_offset_is_applied() {
        let parsed = parse_timestamp_str("2024-08-10T14:34:56+02:00").unwrap();
        assert_eq!(parsed, expected());
    }

    #[test]
    fn test_fractional_seconds_are_truncated() {
        assert_eq!(
            parse_timestamp_str("2024-08-10T12:34:56.987Z").unwrap(),
            expected()
        );
        assert_eq!(
            parse_timestamp_str("2024-08-10 12:34:56.5").unwrap(),
            expected()
        );
        assert_eq!(parse_timestamp(&json!(1723293296999_i64)).unwrap(), expected());
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(matches!(
            parse_timestamp_str("yesterday"),
            Err(TimestampError::Unrecognized(_))
        ));
        assert!(matches!(
            parse_timestamp_str("10/08/2024 12:34"),
            Err(TimestampError::Unrecognized(_))
        ));
        assert_eq!(parse_timestamp_str("   "), Err(TimestampError::Empty));
        assert_eq!(parse_timestamp(&Value::Null), Err(TimestampError::Empty));
        assert!(parse_timestamp(&json!({"t": 1})).is_err());
    }

    #[test]
    fn test_rejects_negative_epoch() {
        assert!(matches!(
            from_epoch(-5.0),
            Err(TimestampError::OutOfRange(_))
        ));
        assert!(from_epoch(f64::NAN).is_err());
    }
}
