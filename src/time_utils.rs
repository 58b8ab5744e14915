// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared helpers for date/time parsing and formatting.
//!
//! The backend emits timestamps in several encodings depending on the column
//! type and the client that wrote the row. Parsing tries, in order:
//! 1. ISO-8601 with fractional seconds
//! 2. ISO-8601 without fractional seconds
//! 3. the explicit patterns in [`EXPLICIT_PATTERNS`], then [`NAIVE_PATTERN`] as UTC
//!
//! A string matching none of them is an error. There is no fallback to "now".

use crate::error::DecodingError;
use chrono::{DateTime, FixedOffset, NaiveDateTime, SecondsFormat, Utc};

/// Offset-carrying patterns tried after the ISO-8601 parsers.
const EXPLICIT_PATTERNS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.3f%:z", "%Y-%m-%dT%H:%M:%S%:z"];

/// Postgres `timestamp` text form without an offset.
const NAIVE_PATTERN: &str = "%Y-%m-%d %H:%M:%S";

/// Format a UTC timestamp as RFC3339 using a `Z` suffix, keeping sub-second precision.
pub fn format_utc_rfc3339(date: DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// Parse a backend timestamp using the flexible policy described above.
pub fn parse_flexible(value: &str) -> Result<DateTime<Utc>, DecodingError> {
    let value = value.trim();

    // Covers both the fractional and whole-second forms
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }

    for pattern in EXPLICIT_PATTERNS {
        if let Ok(dt) = DateTime::<FixedOffset>::parse_from_str(value, pattern) {
            return Ok(dt.with_timezone(&Utc));
        }
    }

    if let Ok(naive) = NaiveDateTime::parse_from_str(value, NAIVE_PATTERN) {
        return Ok(naive.and_utc());
    }

    Err(DecodingError::Date(format!(
        "{}: {:?}",
        DecodingError::DATE_MARKER,
        value
    )))
}

/// Serde adapter for required timestamp fields.
pub mod flexible {
    use super::{format_utc_rfc3339, parse_flexible};
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(date: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format_utc_rfc3339(*date))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse_flexible(&raw).map_err(serde::de::Error::custom)
    }
}

/// Serde adapter for optional timestamp fields.
///
/// `null` and a missing field both decode to `None`; pair with
/// `#[serde(default)]` on the field.
pub mod flexible_option {
    use super::{format_utc_rfc3339, parse_flexible};
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        date: &Option<DateTime<Utc>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match date {
            Some(date) => serializer.serialize_some(&format_utc_rfc3339(*date)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            Some(raw) => parse_flexible(&raw).map(Some).map_err(serde::de::Error::custom),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Timelike};

    #[test]
    fn test_parses_fractional_iso() {
        let dt = parse_flexible("2024-03-01T08:30:15.250+00:00").unwrap();
        assert_eq!(dt.nanosecond(), 250_000_000);
        assert_eq!(dt.second(), 15);
    }

    #[test]
    fn test_parses_iso_without_fraction() {
        let dt = parse_flexible("2024-03-01T08:30:15Z").unwrap();
        assert_eq!(dt, Utc.with_ymd_and_hms(2024, 3, 1, 8, 30, 15).unwrap());
    }

    #[test]
    fn test_parses_offset_and_converts_to_utc() {
        let dt = parse_flexible("2024-03-01T08:30:15-08:00").unwrap();
        assert_eq!(dt, Utc.with_ymd_and_hms(2024, 3, 1, 16, 30, 15).unwrap());
    }

    #[test]
    fn test_parses_space_separated_as_utc() {
        let dt = parse_flexible("2024-03-01 08:30:15").unwrap();
        assert_eq!(dt, Utc.with_ymd_and_hms(2024, 3, 1, 8, 30, 15).unwrap());
    }

    #[test]
    fn test_rejects_unknown_format() {
        let err = parse_flexible("03/01/2024 8:30 AM").unwrap_err();
        assert!(matches!(err, DecodingError::Date(ref msg) if msg.contains(DecodingError::DATE_MARKER)));
    }

    #[test]
    fn test_format_keeps_fraction() {
        let dt = parse_flexible("2024-03-01T08:30:15.123456Z").unwrap();
        assert_eq!(format_utc_rfc3339(dt), "2024-03-01T08:30:15.123456Z");
    }
}
