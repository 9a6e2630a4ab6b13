//! Transient versus permanent failure classification.

use super::BackoffPolicy;
use crate::task::domain::{AttemptFailure, Task};
use std::fmt;
use std::time::Duration;

/// Why a task was moved to the dead-letter state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeadLetterReason {
    /// The task was cancelled.
    Cancelled,
    /// Two consecutive attempts failed validation the same way.
    RepeatedValidationError {
        /// Shared validation signature.
        signature: String,
    },
    /// Two consecutive attempts crashed with the same exit code and no output.
    CrashLoop {
        /// Shared exit code, absent for signal deaths.
        code: Option<i32>,
    },
    /// Charged failures exceeded the retry budget.
    RetryBudgetExhausted {
        /// Charged failures so far.
        retry_count: u32,
        /// Budget of the task.
        max_retries: u32,
        /// Most recent failure.
        last_failure: String,
    },
}

impl fmt::Display for DeadLetterReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cancelled => f.write_str("cancelled"),
            Self::RepeatedValidationError { signature } => {
                write!(f, "same validation error on consecutive attempts: {signature}")
            }
            Self::CrashLoop { code: Some(code) } => {
                write!(f, "crash loop: consecutive exits with code {code} and no output")
            }
            Self::CrashLoop { code: None } => {
                f.write_str("crash loop: consecutive signal deaths with no output")
            }
            Self::RetryBudgetExhausted {
                retry_count,
                max_retries,
                last_failure,
            } => write!(
                f,
                "retry budget exhausted ({retry_count} failures, max {max_retries}): {last_failure}"
            ),
        }
    }
}

/// Classification of a single failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureClass {
    /// Worth retrying while budget remains.
    Transient,
    /// Never worth retrying.
    Permanent(DeadLetterReason),
}

/// What to do with a task after a failed attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Requeue the task once `delay` has elapsed.
    Retry {
        /// Backoff before the task re-enters the queue.
        delay: Duration,
    },
    /// Terminal; the task is never retried again.
    DeadLetter {
        /// Recorded cause.
        reason: DeadLetterReason,
    },
}

/// Decides between retry and dead letter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryPolicy {
    backoff: BackoffPolicy,
}

impl RetryPolicy {
    /// Creates a policy with the given backoff.
    #[must_use]
    pub const fn new(backoff: BackoffPolicy) -> Self {
        Self { backoff }
    }

    /// Returns the backoff parameters.
    #[must_use]
    pub const fn backoff(&self) -> &BackoffPolicy {
        &self.backoff
    }

    /// Classifies `current` given the failure of the attempt before it.
    #[must_use]
    pub fn classify(
        previous: Option<&AttemptFailure>,
        current: &AttemptFailure,
    ) -> FailureClass {
        match (previous, current) {
            (_, AttemptFailure::Cancelled) => FailureClass::Permanent(DeadLetterReason::Cancelled),
            (
                Some(AttemptFailure::OutputInvalid { signature: before }),
                AttemptFailure::OutputInvalid { signature },
            ) if before == signature => {
                FailureClass::Permanent(DeadLetterReason::RepeatedValidationError {
                    signature: signature.clone(),
                })
            }
            (
                Some(AttemptFailure::NonZeroExit {
                    code: before,
                    output_present: false,
                }),
                AttemptFailure::NonZeroExit {
                    code,
                    output_present: false,
                },
            ) if before == code => FailureClass::Permanent(DeadLetterReason::CrashLoop { code: *code }),
            _ => FailureClass::Transient,
        }
    }

    /// Decides the fate of `task` after its latest attempt failed with
    /// `current`.
    ///
    /// `task` must already carry the charge for `current`, so the budget
    /// check sees the post-failure count. `previous` is the failure of the
    /// attempt before, if any.
    #[must_use]
    pub fn decide(
        &self,
        task: &Task,
        previous: Option<&AttemptFailure>,
        current: &AttemptFailure,
    ) -> RetryDecision {
        if let FailureClass::Permanent(reason) = Self::classify(previous, current) {
            return RetryDecision::DeadLetter { reason };
        }
        if current.is_charged() && task.retry_budget_exhausted() {
            return RetryDecision::DeadLetter {
                reason: DeadLetterReason::RetryBudgetExhausted {
                    retry_count: task.retry_count(),
                    max_retries: task.max_retries(),
                    last_failure: current.to_string(),
                },
            };
        }
        RetryDecision::Retry {
            delay: self.backoff.delay_for(task.retry_count().max(1)),
        }
    }
}
