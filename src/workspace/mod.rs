//! Per-attempt filesystem sandboxes.
//!
//! Each attempt gets `<root>/<task-id>-<attempt>/` holding `context/`,
//! `prompt.md`, `output/`, `artifacts/` and `worker.log`. Unsuccessful
//! attempts are copied to `<archive>/<task-id>/attempt-<n>/` before the
//! sandbox is removed.

mod error;
mod layout;
mod manager;
mod prompt;

pub use error::WorkspaceError;
pub use layout::{
    ARTIFACTS_DIR, CONTEXT_DIR, LOG_FILE, OUTPUT_DIR, PROMPT_FILE, RESULT_FILE, Workspace,
};
pub use manager::{WorkspaceManager, WorkspaceSettings, WorkspaceStats};
pub use prompt::{FALLBACK_TEMPLATE, PromptPaths, PromptRenderer};

#[cfg(test)]
mod tests;
