//! Result artifact errors.

use camino::Utf8PathBuf;
use thiserror::Error;

/// Reasons a result artifact was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OutputError {
    /// The worker did not write the output slot.
    #[error("result artifact missing at {path}")]
    Missing {
        /// Expected artifact path.
        path: Utf8PathBuf,
    },
    /// The artifact is unreadable or does not have the expected shape.
    #[error("result artifact is malformed: {reason}")]
    Malformed {
        /// Stable description of the first problem found.
        reason: String,
    },
}

impl OutputError {
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        Self::Malformed {
            reason: reason.into(),
        }
    }

    /// Stable string identifying the kind of problem.
    ///
    /// Two attempts failing with the same signature are failing the same way.
    #[must_use]
    pub fn signature(&self) -> String {
        match self {
            Self::Missing { .. } => "missing".to_owned(),
            Self::Malformed { reason } => format!("malformed: {reason}"),
        }
    }
}
