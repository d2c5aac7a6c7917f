//! Timestamp conversion between `chrono` and `DuckDB` `TIMESTAMP` text.
//!
//! Timestamps are stored as UTC `TIMESTAMP` (no time zone) and bound as
//! text, then read back through a `::VARCHAR` cast.

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::DbError;

const WRITE_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// Renders a UTC timestamp in the text form `DuckDB` casts to `TIMESTAMP`.
pub fn format_timestamp(dt: &DateTime<Utc>) -> String {
    dt.format(WRITE_FORMAT).to_string()
}

/// Parses a `DuckDB` timestamp text representation into a UTC `DateTime`.
///
/// `DuckDB`'s `::VARCHAR` cast omits the fractional part when it is zero,
/// so both `2024-01-15 10:30:00` and `2024-01-15 10:30:00.123` occur.
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, DbError> {
    if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f%#z") {
        return Ok(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
        .map(|naive| DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc))
        .map_err(|e| DbError::Conversion {
            message: format!("invalid timestamp {s:?}: {e}"),
        })
}
