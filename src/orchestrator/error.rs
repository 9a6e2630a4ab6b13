//! Coordinator errors.

use crate::admission::AdmissionError;
use crate::config::ConfigError;
use crate::dispatch::services::DispatchError;
use crate::task::domain::{TaskDomainError, TaskId};
use crate::task::ports::TaskRepositoryError;
use crate::workspace::WorkspaceError;
use thiserror::Error;

/// Errors surfaced by [`super::Orchestrator`].
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// The configuration is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Event intake failed.
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
    /// Task persistence failed.
    #[error(transparent)]
    Repository(#[from] TaskRepositoryError),
    /// A lifecycle rule was violated.
    #[error(transparent)]
    Domain(#[from] TaskDomainError),
    /// The admission actor has stopped.
    #[error(transparent)]
    Admission(#[from] AdmissionError),
    /// The orphan sweep failed.
    #[error(transparent)]
    Workspace(#[from] WorkspaceError),
    /// No task has the given identifier.
    #[error("task not found: {0}")]
    NotFound(TaskId),
}

/// Result type for coordinator operations.
pub type OrchestratorResult<T> = Result<T, OrchestratorError>;
