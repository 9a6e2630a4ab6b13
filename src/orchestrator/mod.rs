//! Coordinator wiring intake, admission, sandboxes, supervision and retry.
//!
//! [`Orchestrator::run`] pulls leases from the admission controller and runs
//! each admitted task's attempt on its own Tokio task. Every read-modify-write
//! of a task record happens under that task's lock, so attempt completion,
//! delayed requeues and cancellation never interleave on one task.

mod alerts;
mod error;
mod service;
mod status;

#[cfg(test)]
pub(crate) use alerts::MockPlatformAlertSink;
pub use alerts::{PlatformAlert, PlatformAlertSink, TracingAlertSink};
pub use error::{OrchestratorError, OrchestratorResult};
pub use service::{Orchestrator, RecoveryReport};
pub use status::{OutcomeRecord, RECENT_OUTCOMES, StatusSnapshot};

#[cfg(test)]
mod tests;
