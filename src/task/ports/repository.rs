//! Repository port for task, attempt and action persistence.

use crate::task::domain::{Action, Attempt, AttemptNumber, Task, TaskId, TaskState};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

/// Result type for task repository operations.
pub type TaskRepositoryResult<T> = Result<T, TaskRepositoryError>;

/// Task persistence contract.
///
/// Tasks, attempts and actions are all queryable by task identifier.
#[async_trait]
pub trait TaskRepository: Send + Sync {
    /// Stores a new task.
    ///
    /// # Errors
    ///
    /// Returns [`TaskRepositoryError::DuplicateTask`] when the task ID already
    /// exists.
    async fn store(&self, task: &Task) -> TaskRepositoryResult<()>;

    /// Persists changes to an existing task.
    ///
    /// # Errors
    ///
    /// Returns [`TaskRepositoryError::NotFound`] when the task does not exist.
    async fn update(&self, task: &Task) -> TaskRepositoryResult<()>;

    /// Finds a task by identifier.
    ///
    /// Returns `None` when the task does not exist.
    async fn find_by_id(&self, id: TaskId) -> TaskRepositoryResult<Option<Task>>;

    /// Returns all tasks currently in one of `states`, oldest first.
    async fn find_by_states(&self, states: &[TaskState]) -> TaskRepositoryResult<Vec<Task>>;

    /// Inserts an attempt, or replaces the stored attempt with the same task
    /// and number.
    ///
    /// # Errors
    ///
    /// Returns [`TaskRepositoryError::NotFound`] when the owning task does not
    /// exist.
    async fn record_attempt(&self, attempt: &Attempt) -> TaskRepositoryResult<()>;

    /// Returns the attempts of a task ordered by attempt number.
    async fn attempts_for(&self, task_id: TaskId) -> TaskRepositoryResult<Vec<Attempt>>;

    /// Returns one attempt of a task.
    async fn find_attempt(
        &self,
        task_id: TaskId,
        number: AttemptNumber,
    ) -> TaskRepositoryResult<Option<Attempt>>;

    /// Appends action audit records. Existing records are never modified.
    ///
    /// # Errors
    ///
    /// Returns [`TaskRepositoryError::DuplicateAction`] when an action ID is
    /// already stored.
    async fn append_actions(&self, actions: &[Action]) -> TaskRepositoryResult<()>;

    /// Returns the action trail of a task in insertion order.
    async fn actions_for(&self, task_id: TaskId) -> TaskRepositoryResult<Vec<Action>>;
}

/// Errors returned by task repository implementations.
#[derive(Debug, Clone, Error)]
pub enum TaskRepositoryError {
    /// A task with the same identifier already exists.
    #[error("duplicate task identifier: {0}")]
    DuplicateTask(TaskId),

    /// An action with the same identifier already exists.
    #[error("duplicate action identifier: {0}")]
    DuplicateAction(uuid::Uuid),

    /// The task was not found.
    #[error("task not found: {0}")]
    NotFound(TaskId),

    /// Persistence-layer failure.
    #[error("persistence error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl TaskRepositoryError {
    /// Wraps a persistence error.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }
}
