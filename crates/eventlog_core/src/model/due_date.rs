//! Flexible due-date parsing.
//!
//! # Responsibility
//! - Turn user-supplied absolute or relative date text into one UTC instant.
//!
//! # Invariants
//! - Inputs without an explicit offset are interpreted as UTC.
//! - Date-only inputs resolve to midnight UTC.
//! - Unparsable input is always an error, never a silent fallback to `now`.
//! - Results stay within years `0..=9999` so storage text keeps its fixed
//!   width.

use crate::model::event::EventValidationError;
use crate::model::timestamp::Timestamp;
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
];

const OFFSET_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%:z",
    "%Y-%m-%d %H:%M:%S%z",
    "%Y-%m-%dT%H:%M:%S%z",
    "%Y-%m-%dT%H:%M%:z",
];

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%B %d, %Y",
    "%b %d, %Y",
    "%B %d %Y",
    "%b %d %Y",
    "%d %B %Y",
    "%d %b %Y",
];

static KEYWORD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(today|tomorrow|yesterday)(?:\s+(?:at\s+)?(\d{1,2}:\d{2}(?::\d{2})?))?$")
        .expect("valid keyword regex")
});
static RELATIVE_FUTURE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^in\s+(\d{1,6})\s+(minute|min|hour|hr|day|week)s?$")
        .expect("valid relative future regex")
});
static RELATIVE_PAST_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{1,6})\s+(minute|min|hour|hr|day|week)s?\s+ago$")
        .expect("valid relative past regex")
});
const STORABLE_YEARS: std::ops::RangeInclusive<i32> = 0..=9999;

static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid ws regex"));

/// Parses due-date text relative to `now`.
///
/// # Errors
/// - Returns `EventValidationError::InvalidDueDate` when no supported
///   absolute or relative form matches, or when the resolved instant falls
///   outside years `0..=9999`.
pub fn parse_due_at(input: &str, now: Timestamp) -> Result<Timestamp, EventValidationError> {
    let trimmed = input.trim();
    let invalid = || EventValidationError::InvalidDueDate(trimmed.to_string());
    if trimmed.is_empty() {
        return Err(invalid());
    }

    let parsed = match parse_absolute(trimmed) {
        Some(parsed) => Some(parsed),
        None => {
            let normalized = WHITESPACE_RE
                .replace_all(trimmed, " ")
                .to_ascii_lowercase();
            parse_relative(normalized.as_str(), now)
        }
    };

    parsed
        .filter(|instant| STORABLE_YEARS.contains(&instant.year()))
        .ok_or_else(invalid)
}

fn parse_absolute(text: &str) -> Option<Timestamp> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some(parsed.with_timezone(&Utc));
    }

    for format in OFFSET_DATETIME_FORMATS {
        if let Ok(parsed) = DateTime::parse_from_str(text, format) {
            return Some(parsed.with_timezone(&Utc));
        }
    }

    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(text, format) {
            return Some(Utc.from_utc_datetime(&parsed));
        }
    }

    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(text, format) {
            return Some(Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN)));
        }
    }

    None
}

fn parse_relative(text: &str, now: Timestamp) -> Option<Timestamp> {
    if text == "now" {
        return Some(now);
    }

    if let Some(caps) = KEYWORD_RE.captures(text) {
        let day_offset = match &caps[1] {
            "yesterday" => -1,
            "tomorrow" => 1,
            _ => 0,
        };
        let date = now
            .date_naive()
            .checked_add_signed(Duration::days(day_offset))?;
        let time = match caps.get(2) {
            Some(value) => parse_clock_time(value.as_str())?,
            None => NaiveTime::MIN,
        };
        return Some(Utc.from_utc_datetime(&date.and_time(time)));
    }

    if let Some(caps) = RELATIVE_FUTURE_RE.captures(text) {
        let delta = unit_duration(&caps[2], caps[1].parse().ok()?)?;
        return now.checked_add_signed(delta);
    }

    if let Some(caps) = RELATIVE_PAST_RE.captures(text) {
        let delta = unit_duration(&caps[2], caps[1].parse().ok()?)?;
        return now.checked_sub_signed(delta);
    }

    None
}

fn parse_clock_time(value: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(value, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M"))
        .ok()
}

fn unit_duration(unit: &str, amount: i64) -> Option<Duration> {
    match unit {
        "minute" | "min" => Some(Duration::minutes(amount)),
        "hour" | "hr" => Some(Duration::hours(amount)),
        "day" => Some(Duration::days(amount)),
        "week" => Some(Duration::weeks(amount)),
        _ => None,
    }
}
