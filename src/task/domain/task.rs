//! Task aggregate root and the task lifecycle state machine.

use super::{
    AttemptNumber, ParseStateError, Priority, RepositoryFullName, ResourceId, SourceTag,
    TaskDomainError, TaskId, TaskType,
};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Task lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    /// Waiting for an admission slot.
    Queued,
    /// Holding an admission slot; no attempt running yet.
    Admitted,
    /// A worker attempt is executing.
    AttemptRunning,
    /// The latest attempt succeeded.
    AttemptSucceeded,
    /// The latest attempt failed.
    AttemptFailed,
    /// The latest attempt exceeded a timeout.
    AttemptTimedOut,
    /// Work finished successfully.
    Completed,
    /// Work failed permanently and awaits manual inspection.
    DeadLettered,
    /// A terminal task moved out of the active set.
    Archived,
}

impl TaskState {
    /// Every lifecycle state in declaration order.
    pub const ALL: [Self; 9] = [
        Self::Queued,
        Self::Admitted,
        Self::AttemptRunning,
        Self::AttemptSucceeded,
        Self::AttemptFailed,
        Self::AttemptTimedOut,
        Self::Completed,
        Self::DeadLettered,
        Self::Archived,
    ];

    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Admitted => "admitted",
            Self::AttemptRunning => "attempt_running",
            Self::AttemptSucceeded => "attempt_succeeded",
            Self::AttemptFailed => "attempt_failed",
            Self::AttemptTimedOut => "attempt_timed_out",
            Self::Completed => "completed",
            Self::DeadLettered => "dead_lettered",
            Self::Archived => "archived",
        }
    }

    /// Returns whether the lifecycle permits moving from `self` to `target`.
    #[must_use]
    pub const fn can_transition_to(self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Queued, Self::Admitted | Self::DeadLettered)
                | (
                    Self::Admitted,
                    Self::AttemptRunning | Self::Queued | Self::DeadLettered
                )
                | (
                    Self::AttemptRunning,
                    Self::AttemptSucceeded
                        | Self::AttemptFailed
                        | Self::AttemptTimedOut
                        | Self::Queued
                        | Self::DeadLettered
                )
                | (Self::AttemptSucceeded, Self::Completed)
                | (
                    Self::AttemptFailed | Self::AttemptTimedOut,
                    Self::Queued | Self::DeadLettered
                )
                | (Self::Completed | Self::DeadLettered, Self::Archived)
        )
    }

    /// Returns whether the state ends the task's active life.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::DeadLettered | Self::Archived)
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for TaskState {
    type Error = ParseStateError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let normalized = value.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|state| state.as_str() == normalized)
            .ok_or_else(|| ParseStateError(value.to_owned()))
    }
}

/// Event metadata persisted with each task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskOrigin {
    /// External system the event came from.
    pub source: SourceTag,
    /// Event type reported by the source.
    pub event_type: String,
    /// Resource the event concerns.
    pub resource_id: ResourceId,
    /// Deduplication key claimed when the task was created.
    pub dedupe_key: String,
}

/// Parameter object for creating a new task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTask {
    /// Originating event metadata.
    pub origin: TaskOrigin,
    /// Task kind selected by routing.
    pub task_type: TaskType,
    /// Priority computed at dispatch.
    pub priority: Priority,
    /// Opaque context gathered from the source.
    pub context: Map<String, Value>,
    /// Repository the worker needs source access to, if any.
    pub repository: Option<RepositoryFullName>,
    /// Retry budget for charged failures.
    pub max_retries: u32,
}

/// Task aggregate root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    id: TaskId,
    origin: TaskOrigin,
    task_type: TaskType,
    priority: Priority,
    context: Map<String, Value>,
    repository: Option<RepositoryFullName>,
    state: TaskState,
    retry_count: u32,
    max_retries: u32,
    attempts_started: u32,
    last_failure: Option<String>,
    queued_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// Parameter object for reconstructing a persisted task aggregate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedTaskData {
    /// Persisted task identifier.
    pub id: TaskId,
    /// Persisted origin metadata.
    pub origin: TaskOrigin,
    /// Persisted task type.
    pub task_type: TaskType,
    /// Persisted priority.
    pub priority: Priority,
    /// Persisted context payload.
    pub context: Map<String, Value>,
    /// Persisted repository reference, if any.
    pub repository: Option<RepositoryFullName>,
    /// Persisted lifecycle state.
    pub state: TaskState,
    /// Persisted count of charged failures.
    pub retry_count: u32,
    /// Persisted retry budget.
    pub max_retries: u32,
    /// Persisted count of attempts started.
    pub attempts_started: u32,
    /// Persisted cause of the latest failure or dead letter.
    pub last_failure: Option<String>,
    /// Persisted time the task last entered the queue.
    pub queued_at: DateTime<Utc>,
    /// Persisted creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Persisted latest lifecycle timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Creates a queued task.
    #[must_use]
    pub fn new(new_task: NewTask, clock: &impl Clock) -> Self {
        let timestamp = clock.utc();
        Self {
            id: TaskId::new(),
            origin: new_task.origin,
            task_type: new_task.task_type,
            priority: new_task.priority,
            context: new_task.context,
            repository: new_task.repository,
            state: TaskState::Queued,
            retry_count: 0,
            max_retries: new_task.max_retries,
            attempts_started: 0,
            last_failure: None,
            queued_at: timestamp,
            created_at: timestamp,
            updated_at: timestamp,
        }
    }

    /// Reconstructs a task from persisted storage.
    #[must_use]
    pub fn from_persisted(data: PersistedTaskData) -> Self {
        Self {
            id: data.id,
            origin: data.origin,
            task_type: data.task_type,
            priority: data.priority,
            context: data.context,
            repository: data.repository,
            state: data.state,
            retry_count: data.retry_count,
            max_retries: data.max_retries,
            attempts_started: data.attempts_started,
            last_failure: data.last_failure,
            queued_at: data.queued_at,
            created_at: data.created_at,
            updated_at: data.updated_at,
        }
    }

    /// Returns the task identifier.
    #[must_use]
    pub const fn id(&self) -> TaskId {
        self.id
    }

    /// Returns the originating event metadata.
    #[must_use]
    pub const fn origin(&self) -> &TaskOrigin {
        &self.origin
    }

    /// Returns the task type.
    #[must_use]
    pub const fn task_type(&self) -> &TaskType {
        &self.task_type
    }

    /// Returns the priority fixed at creation.
    #[must_use]
    pub const fn priority(&self) -> Priority {
        self.priority
    }

    /// Returns the context payload fixed at creation.
    #[must_use]
    pub const fn context(&self) -> &Map<String, Value> {
        &self.context
    }

    /// Returns the repository reference, if any.
    #[must_use]
    pub const fn repository(&self) -> Option<&RepositoryFullName> {
        self.repository.as_ref()
    }

    /// Returns the lifecycle state.
    #[must_use]
    pub const fn state(&self) -> TaskState {
        self.state
    }

    /// Returns the number of charged failures so far.
    #[must_use]
    pub const fn retry_count(&self) -> u32 {
        self.retry_count
    }

    /// Returns the retry budget.
    #[must_use]
    pub const fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Returns how many attempts have been started.
    #[must_use]
    pub const fn attempts_started(&self) -> u32 {
        self.attempts_started
    }

    /// Returns the cause of the latest failure or dead letter.
    #[must_use]
    pub fn last_failure(&self) -> Option<&str> {
        self.last_failure.as_deref()
    }

    /// Returns the time the task last entered the queue.
    #[must_use]
    pub const fn queued_at(&self) -> DateTime<Utc> {
        self.queued_at
    }

    /// Returns the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns the latest lifecycle timestamp.
    #[must_use]
    pub const fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Returns the number the next attempt will carry.
    #[must_use]
    pub fn next_attempt_number(&self) -> AttemptNumber {
        AttemptNumber::new(self.attempts_started.saturating_add(1))
            .unwrap_or_else(|_| AttemptNumber::first())
    }

    /// Returns whether charged failures have exceeded the retry budget.
    #[must_use]
    pub const fn retry_budget_exhausted(&self) -> bool {
        self.retry_count > self.max_retries
    }

    /// Moves the task to `target` if the lifecycle permits it.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::InvalidStateTransition`] when the
    /// transition is not in the lifecycle table.
    pub fn transition_to(
        &mut self,
        target: TaskState,
        clock: &impl Clock,
    ) -> Result<(), TaskDomainError> {
        if !self.state.can_transition_to(target) {
            return Err(TaskDomainError::InvalidStateTransition {
                task_id: self.id,
                from: self.state,
                to: target,
            });
        }
        self.state = target;
        self.touch(clock);
        Ok(())
    }

    /// Marks the task as holding an admission slot.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::InvalidStateTransition`] unless queued.
    pub fn admit(&mut self, clock: &impl Clock) -> Result<(), TaskDomainError> {
        self.transition_to(TaskState::Admitted, clock)
    }

    /// Starts a new attempt and returns its number.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::InvalidStateTransition`] unless admitted.
    pub fn begin_attempt(&mut self, clock: &impl Clock) -> Result<AttemptNumber, TaskDomainError> {
        let number = self.next_attempt_number();
        self.transition_to(TaskState::AttemptRunning, clock)?;
        self.attempts_started = number.value();
        Ok(number)
    }

    /// Records a failed attempt against the retry budget.
    ///
    /// The count only ever grows.
    pub fn charge_failure(&mut self, cause: impl Into<String>, clock: &impl Clock) {
        self.retry_count = self.retry_count.saturating_add(1);
        self.last_failure = Some(cause.into());
        self.touch(clock);
    }

    /// Returns the task to the queue, stamping a fresh queued time.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::InvalidStateTransition`] from terminal or
    /// already queued states.
    pub fn requeue(
        &mut self,
        queued_at: DateTime<Utc>,
        clock: &impl Clock,
    ) -> Result<(), TaskDomainError> {
        self.transition_to(TaskState::Queued, clock)?;
        self.queued_at = queued_at;
        Ok(())
    }

    /// Completes a task whose latest attempt succeeded.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::InvalidStateTransition`] unless the latest
    /// attempt succeeded.
    pub fn complete(&mut self, clock: &impl Clock) -> Result<(), TaskDomainError> {
        self.transition_to(TaskState::Completed, clock)
    }

    /// Moves the task to the dead-letter state with a recorded reason.
    ///
    /// # Errors
    ///
    /// Returns [`TaskDomainError::InvalidStateTransition`] from states that
    /// cannot dead-letter, including `dead_lettered` itself.
    pub fn dead_letter(
        &mut self,
        reason: impl Into<String>,
        clock: &impl Clock,
    ) -> Result<(), TaskDomainError> {
        self.transition_to(TaskState::DeadLettered, clock)?;
        self.last_failure = Some(reason.into());
        Ok(())
    }

    /// Updates the `updated_at` timestamp to the current clock time.
    fn touch(&mut self, clock: &impl Clock) {
        self.updated_at = clock.utc();
    }
}
