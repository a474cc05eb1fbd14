//! Core domain logic for the event tracker.
//! This crate is the single source of truth for lifecycle invariants.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use config::{AppConfig, ConfigError};
pub use logging::{
    default_log_level, init_logging, init_stderr_logging, logging_status, LogTarget, LoggingError,
};
pub use model::action::{ActionId, ActionType, EventAction};
pub use model::due_date::parse_due_at;
pub use model::event::{
    Event, EventId, EventPatch, EventStatus, EventValidationError, NewEvent, StatusFilter,
    DEFAULT_PRIORITY,
};
pub use model::timestamp::Timestamp;
pub use repo::event_repo::{
    EventRepository, RepoError, RepoResult, SqliteEventRepository, StatusTransition,
};
pub use service::lifecycle_service::{
    ErrorKind, LifecycleError, LifecycleResult, LifecycleService,
};
pub use service::sample_data::generate_sample_events;

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
