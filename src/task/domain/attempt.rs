//! Execution attempt records.

use super::{AttemptNumber, ParseStateError, TaskId};
use chrono::{DateTime, Utc};
use mockable::Clock;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Status of one execution attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    /// The worker is executing.
    Running,
    /// Zero exit with a schema-valid result.
    Succeeded,
    /// Any other exit combination.
    Failed,
    /// Idle or hard timeout fired.
    TimedOut,
    /// Terminated by a cancellation request.
    Killed,
}

impl AttemptStatus {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::TimedOut => "timed_out",
            Self::Killed => "killed",
        }
    }
}

impl fmt::Display for AttemptStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for AttemptStatus {
    type Error = ParseStateError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_lowercase().as_str() {
            "running" => Ok(Self::Running),
            "succeeded" => Ok(Self::Succeeded),
            "failed" => Ok(Self::Failed),
            "timed_out" => Ok(Self::TimedOut),
            "killed" => Ok(Self::Killed),
            _ => Err(ParseStateError(value.to_owned())),
        }
    }
}

/// Cause recorded for an attempt that did not succeed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AttemptFailure {
    /// The worker exited with a non-zero or missing exit code.
    NonZeroExit {
        /// Exit code, absent when killed by a signal.
        code: Option<i32>,
        /// Whether the worker left a result file behind.
        output_present: bool,
    },
    /// The worker exited zero without writing a result file.
    OutputMissing,
    /// The worker exited zero with a result that failed validation.
    OutputInvalid {
        /// Stable description of the validation error.
        signature: String,
    },
    /// No output activity within the idle timeout.
    IdleTimeout,
    /// Wall-clock time exceeded the hard timeout.
    HardTimeout,
    /// An external cancellation request terminated the worker.
    Cancelled,
    /// Sandbox or process-spawn failure outside the worker's control.
    Infrastructure {
        /// Error description.
        message: String,
    },
}

impl AttemptFailure {
    /// Returns whether the failure was a timeout.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::IdleTimeout | Self::HardTimeout)
    }

    /// Returns whether the failure is charged against the retry budget.
    #[must_use]
    pub const fn is_charged(&self) -> bool {
        !matches!(self, Self::Infrastructure { .. } | Self::Cancelled)
    }
}

impl fmt::Display for AttemptFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NonZeroExit {
                code: Some(code),
                output_present,
            } => write!(f, "worker exited with code {code} (output present: {output_present})"),
            Self::NonZeroExit {
                code: None,
                output_present,
            } => write!(f, "worker terminated by signal (output present: {output_present})"),
            Self::OutputMissing => f.write_str("worker exited cleanly without a result file"),
            Self::OutputInvalid { signature } => write!(f, "invalid result file: {signature}"),
            Self::IdleTimeout => f.write_str("worker produced no output within the idle timeout"),
            Self::HardTimeout => f.write_str("worker exceeded the hard timeout"),
            Self::Cancelled => f.write_str("attempt cancelled"),
            Self::Infrastructure { message } => write!(f, "infrastructure error: {message}"),
        }
    }
}

/// Terminal details reported when an attempt finishes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptReport {
    /// Terminal status.
    pub status: AttemptStatus,
    /// Failure cause for non-successful attempts.
    pub failure: Option<AttemptFailure>,
    /// Worker exit code, if it exited on its own.
    pub exit_code: Option<i32>,
    /// Time of the last observed worker output.
    pub last_activity_at: DateTime<Utc>,
    /// Analysis summary from the validated result.
    pub analysis_summary: Option<String>,
    /// `success` flag the worker declared in its result.
    pub declared_success: Option<bool>,
}

/// One execution of a task inside one workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attempt {
    /// Owning task.
    pub task_id: TaskId,
    /// One-based attempt number.
    pub number: AttemptNumber,
    /// Current or terminal status.
    pub status: AttemptStatus,
    /// Start timestamp.
    pub started_at: DateTime<Utc>,
    /// Time of the last observed worker output.
    pub last_activity_at: DateTime<Utc>,
    /// Terminal timestamp.
    pub finished_at: Option<DateTime<Utc>>,
    /// Failure cause for non-successful attempts.
    pub failure: Option<AttemptFailure>,
    /// Worker exit code, if it exited on its own.
    pub exit_code: Option<i32>,
    /// Analysis summary from the validated result.
    pub analysis_summary: Option<String>,
    /// `success` flag the worker declared in its result.
    pub declared_success: Option<bool>,
    /// Path of the captured log stream.
    pub log_path: String,
}

impl Attempt {
    /// Records the start of an attempt.
    #[must_use]
    pub fn start(
        task_id: TaskId,
        number: AttemptNumber,
        log_path: impl Into<String>,
        clock: &impl Clock,
    ) -> Self {
        let started_at = clock.utc();
        Self {
            task_id,
            number,
            status: AttemptStatus::Running,
            started_at,
            last_activity_at: started_at,
            finished_at: None,
            failure: None,
            exit_code: None,
            analysis_summary: None,
            declared_success: None,
            log_path: log_path.into(),
        }
    }

    /// Applies a terminal report.
    pub fn finish(&mut self, report: AttemptReport, clock: &impl Clock) {
        self.status = report.status;
        self.failure = report.failure;
        self.exit_code = report.exit_code;
        self.last_activity_at = report.last_activity_at;
        self.analysis_summary = report.analysis_summary;
        self.declared_success = report.declared_success;
        self.finished_at = Some(clock.utc());
    }

    /// Returns whether the attempt has reached a terminal status.
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        !matches!(self.status, AttemptStatus::Running)
    }
}
