//! Supervisor infrastructure errors.

use camino::Utf8PathBuf;
use thiserror::Error;

/// Failures outside the worker's control.
///
/// None of these is charged against a task's retry budget.
#[derive(Debug, Error)]
pub enum SupervisorError {
    /// The worker program could not be started.
    #[error("failed to spawn worker `{program}`: {source}")]
    Spawn {
        /// Program that failed to start.
        program: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The attempt log could not be opened or written.
    #[error("failed to write worker log {path}: {source}")]
    Log {
        /// Log file path.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// Waiting on the worker process failed.
    #[error("failed to wait for worker: {0}")]
    Wait(#[source] std::io::Error),
}
