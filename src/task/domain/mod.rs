//! Domain model for orchestrated tasks.
//!
//! A [`Task`] is created from one inbound event, owns zero or more
//! [`Attempt`]s (at most one active) and accumulates an append-only trail of
//! [`Action`]s declared by successful worker runs.

mod action;
mod attempt;
mod error;
mod ids;
mod task;

pub use action::{Action, ActionData};
pub use attempt::{Attempt, AttemptFailure, AttemptReport, AttemptStatus};
pub use error::{ParseStateError, TaskDomainError};
pub use ids::{AttemptNumber, Priority, RepositoryFullName, ResourceId, SourceTag, TaskId, TaskType};
pub use task::{NewTask, PersistedTaskData, Task, TaskOrigin, TaskState};
