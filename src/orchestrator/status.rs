//! Operational snapshot.

use crate::admission::AdmissionStatus;
use crate::task::domain::{TaskId, TaskState};
use crate::workspace::WorkspaceStats;
use chrono::{DateTime, Utc};
use std::collections::VecDeque;

/// Number of terminal outcomes kept for [`StatusSnapshot::recent`].
pub const RECENT_OUTCOMES: usize = 32;

/// Terminal outcome of one task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutcomeRecord {
    /// Task that finished.
    pub task_id: TaskId,
    /// `completed` or `dead_lettered`.
    pub state: TaskState,
    /// Attempts the task started.
    pub attempts: u32,
    /// Dead-letter reason, if any.
    pub reason: Option<String>,
    /// When the outcome was recorded.
    pub recorded_at: DateTime<Utc>,
}

/// Point-in-time view of the coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusSnapshot {
    /// Admission slot and queue counts.
    pub admission: AdmissionStatus,
    /// Attempts currently holding a slot.
    pub running: Vec<TaskId>,
    /// Sandbox counters.
    pub workspaces: WorkspaceStats,
    /// Most recent terminal outcomes, newest first.
    pub recent: Vec<OutcomeRecord>,
}

#[derive(Debug, Default)]
pub(super) struct OutcomeRing {
    entries: VecDeque<OutcomeRecord>,
}

impl OutcomeRing {
    pub(super) fn push(&mut self, record: OutcomeRecord) {
        if self.entries.len() == RECENT_OUTCOMES {
            self.entries.pop_back();
        }
        self.entries.push_front(record);
    }

    pub(super) fn snapshot(&self) -> Vec<OutcomeRecord> {
        self.entries.iter().cloned().collect()
    }
}
