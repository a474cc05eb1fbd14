//! Domain model for tracked events and their audit history.
//!
//! # Responsibility
//! - Define canonical data structures used by the store and lifecycle layers.
//! - Own input validation and timestamp normalization rules.
//!
//! # Invariants
//! - Every event is identified by a stable, never-reused `EventId`.
//! - Deletion is represented by the `deleted` status, not by row removal.
//! - Action records are append-only.

pub mod action;
pub mod due_date;
pub mod event;
pub mod timestamp;
