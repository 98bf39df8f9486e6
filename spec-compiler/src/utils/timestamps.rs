//! Timestamp helpers for status events and credential expiry.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use thiserror::Error;

/// Represents a timestamp that can be serialized/deserialized.
pub type Timestamp = DateTime<Utc>;

/// Errors that can occur during timestamp parsing.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TimestampError {
    /// The timestamp string is empty.
    #[error("Empty timestamp string")]
    EmptyString,

    /// The timestamp value is invalid.
    #[error("Invalid timestamp: {0}")]
    InvalidFormat(String),
}

/// Returns the current UTC time as an ISO 8601 formatted string.
///
/// The format is `YYYY-MM-DDTHH:MM:SS.ffffff+00:00`, which is what the
/// plan scheduler expects in status events.
///
/// # Examples
///
/// ```
/// use spec_compiler::utils::iso_timestamp;
///
/// let ts = iso_timestamp();
/// assert!(ts.contains('T'));
/// assert!(ts.ends_with("+00:00"));
/// ```
#[must_use]
pub fn iso_timestamp() -> String {
    format_iso8601(&Utc::now())
}

/// Returns the current UTC timestamp.
#[must_use]
pub fn now_utc() -> Timestamp {
    Utc::now()
}

/// Formats a timestamp as ISO 8601 string.
#[must_use]
pub fn format_iso8601(dt: &Timestamp) -> String {
    dt.format("%Y-%m-%dT%H:%M:%S%.6f+00:00").to_string()
}

/// Parses a timestamp as returned by the token-minting service.
///
/// Supports RFC 3339 (with `Z` or an explicit offset), naive ISO 8601
/// date-times (interpreted as UTC), and Unix seconds.
///
/// # Errors
///
/// Returns `TimestampError` if the input cannot be parsed.
pub fn parse_timestamp(input: &str) -> Result<Timestamp, TimestampError> {
    let trimmed = input.trim();

    if trimmed.is_empty() {
        return Err(TimestampError::EmptyString);
    }

    if let Ok(secs) = trimmed.parse::<i64>() {
        return Utc
            .timestamp_opt(secs, 0)
            .single()
            .ok_or_else(|| TimestampError::InvalidFormat(trimmed.to_string()));
    }

    let normalized = trimmed.replace('Z', "+00:00");
    if let Ok(dt) = DateTime::parse_from_rfc3339(&normalized) {
        return Ok(dt.with_timezone(&Utc));
    }

    let formats = [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
    ];

    for fmt in formats {
        if let Ok(naive) = NaiveDateTime::parse_from_str(&normalized, fmt) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }

    Err(TimestampError::InvalidFormat(trimmed.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    #[test]
    fn test_parse_rfc3339_zulu() {
        let dt = parse_timestamp("2025-10-05T14:30:00Z").unwrap();
        assert_eq!(dt.year(), 2025);
        assert_eq!(dt.month(), 10);
        assert_eq!(dt.day(), 5);
    }

    #[test]
    fn test_parse_with_offset_normalizes_to_utc() {
        let dt = parse_timestamp("2025-10-05T16:30:00+02:00").unwrap();
        assert_eq!(dt, parse_timestamp("2025-10-05T14:30:00Z").unwrap());
    }

    #[test]
    fn test_parse_naive_is_utc() {
        let dt = parse_timestamp("2025-10-05T14:30:00").unwrap();
        assert_eq!(format_iso8601(&dt), "2025-10-05T14:30:00.000000+00:00");
    }

    #[test]
    fn test_parse_unix_seconds() {
        let dt = parse_timestamp("1696512000").unwrap();
        assert_eq!(dt.year(), 2023);
    }

    #[test]
    fn test_parse_empty_string() {
        assert_eq!(parse_timestamp("  "), Err(TimestampError::EmptyString));
    }

    #[test]
    fn test_parse_garbage() {
        assert!(matches!(
            parse_timestamp("next tuesday"),
            Err(TimestampError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_iso_timestamp_suffix() {
        assert!(iso_timestamp().ends_with("+00:00"));
    }
}
