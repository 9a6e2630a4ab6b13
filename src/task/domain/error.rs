//! Error types for task domain validation and parsing.

use super::{TaskId, TaskState};
use thiserror::Error;

/// Errors returned while constructing or mutating domain task values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TaskDomainError {
    /// The source tag is blank.
    #[error("source tag must not be empty")]
    EmptySourceTag,

    /// The task type is empty or contains unsupported characters.
    #[error("invalid task type '{0}', expected lowercase [a-z0-9_-]+")]
    InvalidTaskType(String),

    /// The resource identifier is blank.
    #[error("resource identifier must not be empty")]
    EmptyResourceId,

    /// The repository name does not follow `owner/repo` format.
    #[error("invalid repository name '{0}', expected owner/repo")]
    InvalidRepository(String),

    /// Attempt numbers are one-based.
    #[error("invalid attempt number {0}, expected a positive integer")]
    InvalidAttemptNumber(u32),

    /// The context payload is not a JSON object.
    #[error("task context must be a JSON object")]
    ContextNotObject,

    /// The requested lifecycle transition is not permitted.
    #[error("task {task_id} cannot transition from {from} to {to}")]
    InvalidStateTransition {
        /// Task whose transition was rejected.
        task_id: TaskId,
        /// State the task was in.
        from: TaskState,
        /// Requested target state.
        to: TaskState,
    },
}

/// Error returned while parsing lifecycle or attempt states from persistence.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown state: {0}")]
pub struct ParseStateError(pub String);
