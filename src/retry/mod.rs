//! Retry scheduling and failure classification.
//!
//! [`RetryPolicy::decide`] turns a charged failure into either a delayed
//! requeue or a terminal dead letter. [`BackoffPolicy`] computes the delay and
//! is shared with the orchestrator's infrastructure retries.

mod backoff;
mod policy;

pub use backoff::BackoffPolicy;
pub use policy::{DeadLetterReason, FailureClass, RetryDecision, RetryPolicy};
