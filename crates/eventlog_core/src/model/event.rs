//! Event domain model.
//!
//! # Responsibility
//! - Define the tracked event record and its lifecycle status.
//! - Define create/update input shapes and their validation.
//!
//! # Invariants
//! - `id` is assigned by storage and never reused.
//! - `title` is never empty after trim.
//! - `created_at` is immutable; `last_modified` never moves backwards.

use crate::model::due_date::parse_due_at;
use crate::model::timestamp::Timestamp;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Stable identifier assigned by the event store.
pub type EventId = i64;

/// Priority used when the caller does not supply one. Lower is more urgent.
pub const DEFAULT_PRIORITY: i64 = 2;

/// Lifecycle state of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    /// Open and actionable.
    Active,
    /// Marked done; may be reopened.
    Completed,
    /// Soft-deleted. Terminal.
    Deleted,
}

impl EventStatus {
    /// Stable text form used in storage and at the boundary.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Deleted => "deleted",
        }
    }
}

impl Display for EventStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventStatus {
    type Err = EventValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "active" => Ok(Self::Active),
            "completed" => Ok(Self::Completed),
            "deleted" => Ok(Self::Deleted),
            _ => Err(EventValidationError::InvalidStatus(value.to_string())),
        }
    }
}

/// Status filter for list queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusFilter {
    /// Only events in the given status.
    Only(EventStatus),
    /// Every status, deleted included.
    All,
}

impl Default for StatusFilter {
    fn default() -> Self {
        Self::Only(EventStatus::Active)
    }
}

impl FromStr for StatusFilter {
    type Err = EventValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if value.trim().eq_ignore_ascii_case("all") {
            return Ok(Self::All);
        }
        value.parse().map(Self::Only)
    }
}

/// Validation failures for event input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventValidationError {
    /// Title missing or blank after trim.
    EmptyTitle,
    /// Due-date text matched no supported format.
    InvalidDueDate(String),
    /// Status text is not one of `active|completed|deleted`.
    InvalidStatus(String),
}

impl Display for EventValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyTitle => write!(f, "title is required"),
            Self::InvalidDueDate(value) => write!(f, "invalid due date format: `{value}`"),
            Self::InvalidStatus(value) => write!(
                f,
                "invalid status `{value}`; expected active|completed|deleted"
            ),
        }
    }
}

impl Error for EventValidationError {}

/// Canonical persisted event record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub title: String,
    pub description: String,
    pub created_at: Timestamp,
    pub due_at: Timestamp,
    /// Free-text annotation such as `morning`. No effect on logic.
    pub time_hint: Option<String>,
    pub priority: i64,
    pub status: EventStatus,
    pub last_modified: Timestamp,
}

/// Input for creating one event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewEvent {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Flexible date text. Missing or blank means "creation time".
    #[serde(default)]
    pub due_at: Option<String>,
    #[serde(default)]
    pub time_hint: Option<String>,
    #[serde(default)]
    pub priority: Option<i64>,
}

impl NewEvent {
    /// Creates input with only the required title set.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    /// Sets flexible due-date text.
    pub fn with_due_at(mut self, due_at: impl Into<String>) -> Self {
        self.due_at = Some(due_at.into());
        self
    }

    /// Checks required fields without resolving the due date.
    pub fn validate(&self) -> Result<(), EventValidationError> {
        validate_title(&self.title)
    }

    /// Resolves the due date, defaulting to `now` when not supplied.
    pub fn resolve_due_at(&self, now: Timestamp) -> Result<Timestamp, EventValidationError> {
        match self.due_at.as_deref().map(str::trim) {
            Some(text) if !text.is_empty() => parse_due_at(text, now),
            _ => Ok(now),
        }
    }
}

/// Partial update. Only `Some` fields are written.
///
/// `status` is a direct, unaudited write; the dedicated complete/reopen
/// transitions are the audited path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventPatch {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub due_at: Option<String>,
    #[serde(default)]
    pub time_hint: Option<String>,
    #[serde(default)]
    pub priority: Option<i64>,
    #[serde(default)]
    pub status: Option<EventStatus>,
}

impl EventPatch {
    /// Checks supplied fields that do not need a reference time.
    pub fn validate(&self) -> Result<(), EventValidationError> {
        match self.title.as_deref() {
            Some(title) => validate_title(title),
            None => Ok(()),
        }
    }

    /// Resolves the supplied due-date text, if any.
    pub fn resolve_due_at(
        &self,
        now: Timestamp,
    ) -> Result<Option<Timestamp>, EventValidationError> {
        self.due_at
            .as_deref()
            .map(|text| parse_due_at(text, now))
            .transpose()
    }

    /// Returns whether no field is set.
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.due_at.is_none()
            && self.time_hint.is_none()
            && self.priority.is_none()
            && self.status.is_none()
    }
}

fn validate_title(title: &str) -> Result<(), EventValidationError> {
    if title.trim().is_empty() {
        return Err(EventValidationError::EmptyTitle);
    }
    Ok(())
}
