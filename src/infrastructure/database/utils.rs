//! Timestamp encoding for database columns.
//!
//! Times are stored as RFC3339 text with nanoseconds in UTC. Reads accept
//! the nanosecond form and fall back to any valid RFC3339 string so rows
//! written by older builds still load. `finished_at` uses the empty
//! string for "not finished".

use chrono::{DateTime, SecondsFormat, Utc};

use crate::domain::error::{DomainError, DomainResult};

/// Encode a timestamp for storage.
pub fn format_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

/// Encode an optional timestamp; `None` becomes the empty string.
pub fn format_opt_ts(ts: Option<DateTime<Utc>>) -> String {
    ts.map(format_ts).unwrap_or_default()
}

/// Decode a stored timestamp.
pub fn parse_ts(raw: &str) -> DomainResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DomainError::Storage(format!("invalid stored timestamp {raw:?}: {e}")))
}

/// Decode an optional stored timestamp; the empty string is `None`.
pub fn parse_opt_ts(raw: &str) -> DomainResult<Option<DateTime<Utc>>> {
    if raw.is_empty() {
        return Ok(None);
    }
    parse_ts(raw).map(Some)
}
