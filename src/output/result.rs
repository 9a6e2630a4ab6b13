//! Validated result artifact.

use crate::task::domain::{Action, ActionData, AttemptNumber, TaskId};
use chrono::{DateTime, Utc};

/// Side effect declared by the worker that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclaredAction {
    /// Operation performed.
    pub action_type: String,
    /// External platform.
    pub platform: String,
    /// Targeted resource.
    pub target_resource_id: String,
    /// Reported time, if the worker gave a valid one.
    pub timestamp: Option<DateTime<Utc>>,
    /// Reported success; absent means `false`.
    pub success: bool,
    /// Optional free-form detail.
    pub detail: Option<String>,
}

/// Schema-valid worker result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerResult {
    /// Outcome the worker declares.
    pub success: bool,
    /// Valid actions in declaration order.
    pub actions: Vec<DeclaredAction>,
    /// Worker's summary of its analysis.
    pub analysis_summary: String,
    /// Actions dropped for missing required fields.
    pub dropped_actions: usize,
}

impl WorkerResult {
    /// Builds audit records for the declared actions.
    ///
    /// Actions without a timestamp are stamped with `validated_at`.
    #[must_use]
    pub fn to_actions(
        &self,
        task_id: TaskId,
        attempt: AttemptNumber,
        validated_at: DateTime<Utc>,
    ) -> Vec<Action> {
        self.actions
            .iter()
            .map(|declared| {
                Action::new(ActionData {
                    task_id,
                    attempt,
                    action_type: declared.action_type.clone(),
                    platform: declared.platform.clone(),
                    target_resource_id: declared.target_resource_id.clone(),
                    timestamp: declared.timestamp.unwrap_or(validated_at),
                    success: declared.success,
                    detail: declared.detail.clone(),
                })
            })
            .collect()
    }
}
