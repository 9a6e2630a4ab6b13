//! Append-only audit records of worker-declared side effects.

use super::{AttemptNumber, TaskId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Field values for an action audit record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionData {
    /// Task the action belongs to.
    pub task_id: TaskId,
    /// Attempt whose result declared the action.
    pub attempt: AttemptNumber,
    /// Operation performed, for example `label_added`.
    pub action_type: String,
    /// External platform the action targeted.
    pub platform: String,
    /// Resource the action targeted.
    pub target_resource_id: String,
    /// Time the worker reports performing the action.
    pub timestamp: DateTime<Utc>,
    /// Whether the worker reports the action succeeded.
    pub success: bool,
    /// Optional free-form detail.
    pub detail: Option<String>,
}

/// Side effect the worker reports having performed on an external system.
///
/// Actions are created once from a validated result and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    id: Uuid,
    task_id: TaskId,
    attempt: AttemptNumber,
    action_type: String,
    platform: String,
    target_resource_id: String,
    timestamp: DateTime<Utc>,
    success: bool,
    detail: Option<String>,
}

impl Action {
    /// Creates a new audit record.
    #[must_use]
    pub fn new(data: ActionData) -> Self {
        Self::from_persisted(Uuid::new_v4(), data)
    }

    /// Reconstructs a persisted audit record.
    #[must_use]
    pub fn from_persisted(id: Uuid, data: ActionData) -> Self {
        Self {
            id,
            task_id: data.task_id,
            attempt: data.attempt,
            action_type: data.action_type,
            platform: data.platform,
            target_resource_id: data.target_resource_id,
            timestamp: data.timestamp,
            success: data.success,
            detail: data.detail,
        }
    }

    /// Returns the record identifier.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Returns the owning task.
    #[must_use]
    pub const fn task_id(&self) -> TaskId {
        self.task_id
    }

    /// Returns the attempt that declared the action.
    #[must_use]
    pub const fn attempt(&self) -> AttemptNumber {
        self.attempt
    }

    /// Returns the operation performed.
    #[must_use]
    pub fn action_type(&self) -> &str {
        &self.action_type
    }

    /// Returns the targeted platform.
    #[must_use]
    pub fn platform(&self) -> &str {
        &self.platform
    }

    /// Returns the targeted resource.
    #[must_use]
    pub fn target_resource_id(&self) -> &str {
        &self.target_resource_id
    }

    /// Returns the reported action time.
    #[must_use]
    pub const fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Returns whether the worker reports success.
    #[must_use]
    pub const fn success(&self) -> bool {
        self.success
    }

    /// Returns the optional detail.
    #[must_use]
    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }
}
