//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into lifecycle-level APIs.
//! - Keep CLI/boundary layers decoupled from storage details.

pub mod lifecycle_service;
pub mod sample_data;
