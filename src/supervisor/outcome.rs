//! Terminal outcomes of a supervised attempt.

use crate::output::{OutputError, WorkerResult};
use crate::task::domain::{AttemptFailure, AttemptReport, AttemptStatus};
use chrono::{DateTime, Utc};
use std::fmt;

/// Which deadline ended the attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeoutKind {
    /// No output for the idle timeout.
    Idle,
    /// Wall-clock time over the hard timeout.
    Hard,
}

impl fmt::Display for TimeoutKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::Hard => "hard",
        })
    }
}

/// Why an attempt that ran to exit did not succeed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureDetail {
    /// Non-zero exit, or termination by a signal the supervisor did not send.
    NonZeroExit {
        /// Exit code, absent for signal deaths.
        code: Option<i32>,
        /// Whether a result file was left behind anyway.
        output_present: bool,
    },
    /// Zero exit without a result file.
    OutputMissing,
    /// Zero exit with a result file that failed validation.
    OutputInvalid(OutputError),
}

/// How an attempt ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// Zero exit with a valid result.
    Succeeded(WorkerResult),
    /// Any other exit.
    Failed(FailureDetail),
    /// A deadline fired and the worker was terminated.
    TimedOut(TimeoutKind),
    /// Cancellation terminated the worker.
    Killed,
}

impl AttemptOutcome {
    /// Maps the outcome onto the persisted attempt status.
    #[must_use]
    pub const fn status(&self) -> AttemptStatus {
        match self {
            Self::Succeeded(_) => AttemptStatus::Succeeded,
            Self::Failed(_) => AttemptStatus::Failed,
            Self::TimedOut(_) => AttemptStatus::TimedOut,
            Self::Killed => AttemptStatus::Killed,
        }
    }

    /// Returns the persisted failure cause, if the attempt did not succeed.
    #[must_use]
    pub fn failure(&self) -> Option<AttemptFailure> {
        match self {
            Self::Succeeded(_) => None,
            Self::Failed(FailureDetail::NonZeroExit {
                code,
                output_present,
            }) => Some(AttemptFailure::NonZeroExit {
                code: *code,
                output_present: *output_present,
            }),
            Self::Failed(FailureDetail::OutputMissing) => Some(AttemptFailure::OutputMissing),
            Self::Failed(FailureDetail::OutputInvalid(err)) => {
                Some(AttemptFailure::OutputInvalid {
                    signature: err.signature(),
                })
            }
            Self::TimedOut(TimeoutKind::Idle) => Some(AttemptFailure::IdleTimeout),
            Self::TimedOut(TimeoutKind::Hard) => Some(AttemptFailure::HardTimeout),
            Self::Killed => Some(AttemptFailure::Cancelled),
        }
    }
}

/// Everything the supervisor observed about one attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    /// Terminal outcome.
    pub outcome: AttemptOutcome,
    /// Exit code of the worker, if it exited with one.
    pub exit_code: Option<i32>,
    /// Time of the last output line, or the start time.
    pub last_activity_at: DateTime<Utc>,
    /// Lines captured into the attempt log.
    pub log_lines: u64,
}

impl RunReport {
    /// Converts the report into the terminal attempt record fields.
    #[must_use]
    pub fn to_attempt_report(&self) -> AttemptReport {
        let (analysis_summary, declared_success) = match &self.outcome {
            AttemptOutcome::Succeeded(result) => {
                (Some(result.analysis_summary.clone()), Some(result.success))
            }
            _ => (None, None),
        };
        AttemptReport {
            status: self.outcome.status(),
            failure: self.outcome.failure(),
            exit_code: self.exit_code,
            last_activity_at: self.last_activity_at,
            analysis_summary,
            declared_success,
        }
    }
}
