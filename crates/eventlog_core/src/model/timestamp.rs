//! Storage representation for timestamps.
//!
//! All timestamps are persisted as fixed-width UTC text so that SQL text
//! ordering matches chronological ordering (`ORDER BY due_at` relies on it).

use chrono::{DateTime, SecondsFormat, Utc};

/// Canonical timestamp type used across the core.
pub type Timestamp = DateTime<Utc>;

/// Formats a timestamp for persistence: `YYYY-MM-DDTHH:MM:SS.ffffffZ`.
pub fn to_storage(value: &Timestamp) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parses a persisted timestamp. Returns `None` for malformed text.
pub fn from_storage(value: &str) -> Option<Timestamp> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|parsed| parsed.with_timezone(&Utc))
}

/// Current time truncated to storage precision.
///
/// Truncation keeps in-memory values equal to their read-back form.
pub fn now() -> Timestamp {
    let current = Utc::now();
    from_storage(&to_storage(&current)).unwrap_or(current)
}
