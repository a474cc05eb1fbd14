//! Event lifecycle use-case service.
//!
//! # Responsibility
//! - Expose create/update/complete/reopen/soft-delete and history reads.
//! - Enforce the legal transition table on top of the event store.
//!
//! # Invariants
//! - `active -> completed` only via `complete`, `completed -> active` only
//!   via `reopen`; both append exactly one action row atomically.
//! - `deleted` is terminal: no operation moves an event out of it.
//! - No state is cached between calls; every operation re-reads storage.
//! - Logs carry ids and outcomes only, never titles or comments.

use crate::model::action::{ActionType, EventAction};
use crate::model::event::{
    Event, EventId, EventPatch, EventStatus, EventValidationError, NewEvent, StatusFilter,
};
use crate::repo::event_repo::{EventRepository, RepoError, StatusTransition};
use log::{error, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type LifecycleResult<T> = Result<T, LifecycleError>;

/// Coarse failure class for request-boundary mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    Internal,
}

/// Errors from lifecycle operations.
#[derive(Debug)]
pub enum LifecycleError {
    /// Malformed or missing input.
    Validation(EventValidationError),
    /// Target event does not exist.
    NotFound(EventId),
    /// Operation is not legal in the event's current status.
    Conflict {
        event_id: EventId,
        /// Status the operation requires, when there is a single one.
        expected: Option<EventStatus>,
        actual: EventStatus,
    },
    /// Persistence-layer failure; the transaction was rolled back.
    Repo(RepoError),
    /// Write succeeded but the read-back did not match.
    InconsistentState(&'static str),
}

impl LifecycleError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Conflict { .. } => ErrorKind::Conflict,
            Self::Repo(_) | Self::InconsistentState(_) => ErrorKind::Internal,
        }
    }
}

impl Display for LifecycleError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "event not found: {id}"),
            Self::Conflict {
                event_id,
                expected: Some(expected),
                actual,
            } => write!(
                f,
                "event {event_id} is `{actual}`; operation requires `{expected}`"
            ),
            Self::Conflict {
                event_id,
                expected: None,
                actual,
            } => write!(f, "event {event_id} is `{actual}`; operation not allowed"),
            Self::Repo(err) => write!(f, "{err}"),
            Self::InconsistentState(details) => write!(f, "inconsistent event state: {details}"),
        }
    }
}

impl Error for LifecycleError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<EventValidationError> for LifecycleError {
    fn from(value: EventValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<RepoError> for LifecycleError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::Validation(err) => Self::Validation(err),
            RepoError::NotFound(id) => Self::NotFound(id),
            RepoError::Conflict {
                event_id,
                expected,
                actual,
            } => Self::Conflict {
                event_id,
                expected: Some(expected),
                actual,
            },
            RepoError::DeletedIsTerminal(event_id) => Self::Conflict {
                event_id,
                expected: None,
                actual: EventStatus::Deleted,
            },
            other => Self::Repo(other),
        }
    }
}

/// Lifecycle manager facade over an event store.
pub struct LifecycleService<R: EventRepository> {
    repo: R,
}

impl<R: EventRepository> LifecycleService<R> {
    /// Creates a service using the provided repository implementation.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Creates one `active` event and returns the stored record.
    ///
    /// # Errors
    /// - `Validation` for a blank title or unparsable `due_at`; nothing is
    ///   persisted.
    pub fn create(&self, input: &NewEvent) -> LifecycleResult<Event> {
        let outcome = input
            .validate()
            .map_err(LifecycleError::from)
            .and_then(|()| Ok(self.repo.insert_event(input)?))
            .and_then(|id| {
                self.repo
                    .get_event(id)?
                    .ok_or(LifecycleError::InconsistentState(
                        "created event not found in read-back",
                    ))
            });
        log_outcome("event_create", None, &outcome);
        outcome
    }

    /// Gets one event by id, any status.
    pub fn get(&self, id: EventId) -> LifecycleResult<Event> {
        self.repo.get_event(id)?.ok_or(LifecycleError::NotFound(id))
    }

    /// Lists events by status filter, ordered by due time ascending.
    pub fn list(&self, filter: StatusFilter) -> LifecycleResult<Vec<Event>> {
        Ok(self.repo.list_events(filter)?)
    }

    /// Applies a partial update.
    ///
    /// A `status` in the patch is written directly and is not recorded in
    /// the action history. Moving a `deleted` event to another status is a
    /// conflict.
    pub fn update(&self, id: EventId, patch: &EventPatch) -> LifecycleResult<Event> {
        let outcome = self.update_inner(id, patch);
        log_outcome("event_update", Some(id), &outcome);
        if outcome.is_ok() {
            if let Some(status) = patch.status {
                warn!(
                    "event=event_status_write module=lifecycle status=ok event_id={} target={} audited=false",
                    id, status
                );
            }
        }
        outcome
    }

    fn update_inner(&self, id: EventId, patch: &EventPatch) -> LifecycleResult<Event> {
        patch.validate()?;
        Ok(self.repo.update_event(id, patch)?)
    }

    /// Marks an `active` event completed and records a `complete` action.
    ///
    /// # Errors
    /// - `NotFound` when the event does not exist.
    /// - `Conflict` when the event is not exactly `active`.
    pub fn complete(&mut self, id: EventId, comment: Option<&str>) -> LifecycleResult<Event> {
        self.transition(
            "event_complete",
            id,
            StatusTransition {
                from: EventStatus::Active,
                to: EventStatus::Completed,
                action_type: ActionType::Complete,
                comment: normalize_comment(comment),
            },
        )
    }

    /// Returns a `completed` event to `active` and records a `reopen` action.
    ///
    /// # Errors
    /// - `NotFound` when the event does not exist.
    /// - `Conflict` when the event is not exactly `completed`.
    pub fn reopen(&mut self, id: EventId, comment: Option<&str>) -> LifecycleResult<Event> {
        self.transition(
            "event_reopen",
            id,
            StatusTransition {
                from: EventStatus::Completed,
                to: EventStatus::Active,
                action_type: ActionType::Reopen,
                comment: normalize_comment(comment),
            },
        )
    }

    fn transition(
        &mut self,
        log_event: &'static str,
        id: EventId,
        transition: StatusTransition<'_>,
    ) -> LifecycleResult<Event> {
        let outcome = self
            .repo
            .transition_status(id, &transition)
            .map_err(LifecycleError::from);
        log_outcome(log_event, Some(id), &outcome);
        outcome
    }

    /// Sets status to `deleted`. Repeating it keeps the event deleted.
    pub fn soft_delete(&self, id: EventId) -> LifecycleResult<()> {
        let outcome = self.repo.soft_delete_event(id).map_err(LifecycleError::from);
        log_outcome("event_soft_delete", Some(id), &outcome);
        outcome
    }

    /// Lists the action history of one event, newest first.
    pub fn list_actions(&self, id: EventId) -> LifecycleResult<Vec<EventAction>> {
        Ok(self.repo.list_actions(id)?)
    }
}

fn normalize_comment(comment: Option<&str>) -> Option<&str> {
    comment.filter(|value| !value.trim().is_empty())
}

fn log_outcome<T>(event: &str, id: Option<EventId>, outcome: &LifecycleResult<T>) {
    let id = id.map_or_else(|| "-".to_string(), |id| id.to_string());
    match outcome {
        Ok(_) => info!("event={event} module=lifecycle status=ok event_id={id}"),
        Err(err) => match err.kind() {
            ErrorKind::Validation | ErrorKind::NotFound => info!(
                "event={event} module=lifecycle status=rejected event_id={id} error_kind={:?}",
                err.kind()
            ),
            ErrorKind::Conflict => warn!(
                "event={event} module=lifecycle status=conflict event_id={id} error={err}"
            ),
            ErrorKind::Internal => error!(
                "event={event} module=lifecycle status=error event_id={id} error={err}"
            ),
        },
    }
}
