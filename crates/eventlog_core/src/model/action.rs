//! Event action audit records.
//!
//! # Invariants
//! - Actions are written exactly once, at the moment of a complete/reopen
//!   transition, and never updated afterwards.

use crate::model::event::EventId;
use crate::model::timestamp::Timestamp;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Sequential action row id.
pub type ActionId = i64;

/// Audited transition kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    /// `active -> completed`.
    Complete,
    /// `completed -> active`.
    Reopen,
}

impl ActionType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Complete => "complete",
            Self::Reopen => "reopen",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "complete" => Some(Self::Complete),
            "reopen" => Some(Self::Reopen),
            _ => None,
        }
    }
}

impl Display for ActionType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable history entry for one lifecycle transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventAction {
    pub id: ActionId,
    pub event_id: EventId,
    pub action_type: ActionType,
    pub action_time: Timestamp,
    pub comment: Option<String>,
}
