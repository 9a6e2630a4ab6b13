//! Port contracts for task persistence.
//!
//! Ports define infrastructure-agnostic interfaces used by the orchestrator.

pub mod repository;

pub use repository::{TaskRepository, TaskRepositoryError, TaskRepositoryResult};
