//! Workspace errors. All of them are infrastructure failures.

use camino::Utf8PathBuf;
use thiserror::Error;

/// Errors raised while materialising or tearing down a sandbox.
#[derive(Debug, Error)]
pub enum WorkspaceError {
    /// A filesystem operation failed.
    #[error("workspace I/O failed at {path}: {source}")]
    Io {
        /// Path the operation targeted.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// A context value could not be serialised.
    #[error("context key `{key}` could not be serialised: {reason}")]
    Context {
        /// Context key.
        key: String,
        /// Serialiser message.
        reason: String,
    },
    /// The prompt template failed to render.
    #[error("prompt template for task type `{task_type}` failed to render: {reason}")]
    Template {
        /// Task type whose template failed.
        task_type: String,
        /// Renderer message.
        reason: String,
    },
    /// The blocking filesystem job did not complete.
    #[error("workspace job aborted: {0}")]
    Aborted(String),
}

impl WorkspaceError {
    pub(crate) fn io(path: impl Into<Utf8PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
