//! Escalation port for problems that need an operator.

use crate::task::domain::TaskId;
use std::fmt;
use tracing::error;

/// Something an operator should look at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformAlert {
    /// Infrastructure kept failing for a task past the local retry limit.
    Infrastructure {
        /// Affected task.
        task_id: TaskId,
        /// Consecutive infrastructure failures.
        failures: u32,
        /// Latest error.
        message: String,
    },
    /// A task reached the dead-letter state.
    DeadLettered {
        /// Affected task.
        task_id: TaskId,
        /// Recorded cause.
        reason: String,
    },
}

impl fmt::Display for PlatformAlert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Infrastructure {
                task_id,
                failures,
                message,
            } => write!(
                f,
                "task {task_id}: {failures} consecutive infrastructure failures, last: {message}"
            ),
            Self::DeadLettered { task_id, reason } => {
                write!(f, "task {task_id} dead-lettered: {reason}")
            }
        }
    }
}

/// Receives platform alerts.
#[cfg_attr(test, mockall::automock)]
pub trait PlatformAlertSink: Send + Sync {
    /// Delivers one alert. Must not block.
    fn raise(&self, alert: PlatformAlert);
}

/// Writes alerts to the `error` log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAlertSink;

impl PlatformAlertSink for TracingAlertSink {
    fn raise(&self, alert: PlatformAlert) {
        match &alert {
            PlatformAlert::Infrastructure {
                task_id, failures, ..
            } => error!(task_id = %task_id, failures, alert = %alert, "platform alert"),
            PlatformAlert::DeadLettered { task_id, .. } => {
                error!(task_id = %task_id, alert = %alert, "platform alert");
            }
        }
    }
}
