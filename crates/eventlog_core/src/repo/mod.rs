//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the event store contract used by the lifecycle service.
//! - Isolate SQLite query details from lifecycle orchestration.
//!
//! # Invariants
//! - Repository writes validate input before persistence.
//! - Repository APIs return semantic errors (`NotFound`, `Conflict`) in
//!   addition to DB transport errors.

pub mod event_repo;
