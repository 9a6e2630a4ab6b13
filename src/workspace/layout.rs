//! Sandbox directory layout.

use crate::task::domain::{AttemptNumber, TaskId};
use camino::{Utf8Path, Utf8PathBuf};

/// Directory holding one JSON file per top-level context key.
pub const CONTEXT_DIR: &str = "context";
/// Rendered prompt file.
pub const PROMPT_FILE: &str = "prompt.md";
/// Directory the worker writes its result into.
pub const OUTPUT_DIR: &str = "output";
/// Result artifact inside [`OUTPUT_DIR`].
pub const RESULT_FILE: &str = "result.json";
/// Free-form worker artifacts.
pub const ARTIFACTS_DIR: &str = "artifacts";
/// Captured stdout and stderr.
pub const LOG_FILE: &str = "worker.log";

/// Sandbox owned by exactly one attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    task_id: TaskId,
    attempt: AttemptNumber,
    root: Utf8PathBuf,
    context_files: Vec<String>,
}

impl Workspace {
    pub(crate) const fn new(
        task_id: TaskId,
        attempt: AttemptNumber,
        root: Utf8PathBuf,
        context_files: Vec<String>,
    ) -> Self {
        Self {
            task_id,
            attempt,
            root,
            context_files,
        }
    }

    /// Directory name for an attempt: `<task-id>-<attempt>`.
    #[must_use]
    pub fn dir_name(task_id: TaskId, attempt: AttemptNumber) -> String {
        format!("{task_id}-{attempt}")
    }

    /// Parses a directory name produced by [`Workspace::dir_name`].
    #[must_use]
    pub fn parse_dir_name(name: &str) -> Option<(TaskId, AttemptNumber)> {
        let (task, attempt) = name.rsplit_once('-')?;
        let task_id = uuid::Uuid::parse_str(task).ok().map(TaskId::from_uuid)?;
        let attempt = attempt.parse::<u32>().ok()?;
        AttemptNumber::new(attempt).ok().map(|number| (task_id, number))
    }

    /// Owning task.
    #[must_use]
    pub const fn task_id(&self) -> TaskId {
        self.task_id
    }

    /// Attempt the sandbox belongs to.
    #[must_use]
    pub const fn attempt(&self) -> AttemptNumber {
        self.attempt
    }

    /// Sandbox root, also the worker's working directory.
    #[must_use]
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Context file names, relative to [`Workspace::context_dir`].
    #[must_use]
    pub fn context_files(&self) -> &[String] {
        &self.context_files
    }

    /// Context directory.
    #[must_use]
    pub fn context_dir(&self) -> Utf8PathBuf {
        self.root.join(CONTEXT_DIR)
    }

    /// Rendered prompt path.
    #[must_use]
    pub fn prompt_path(&self) -> Utf8PathBuf {
        self.root.join(PROMPT_FILE)
    }

    /// Output directory.
    #[must_use]
    pub fn output_dir(&self) -> Utf8PathBuf {
        self.root.join(OUTPUT_DIR)
    }

    /// Output slot the worker must fill.
    #[must_use]
    pub fn result_path(&self) -> Utf8PathBuf {
        self.output_dir().join(RESULT_FILE)
    }

    /// Artifacts directory.
    #[must_use]
    pub fn artifacts_dir(&self) -> Utf8PathBuf {
        self.root.join(ARTIFACTS_DIR)
    }

    /// Captured worker log.
    #[must_use]
    pub fn log_path(&self) -> Utf8PathBuf {
        self.root.join(LOG_FILE)
    }
}

/// Maps a context key to a safe file name (without extension).
pub(crate) fn context_file_stem(key: &str) -> String {
    let stem: String = key
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || matches!(ch, '_' | '-' | '.') {
                ch
            } else {
                '_'
            }
        })
        .collect();
    let trimmed = stem.trim_start_matches('.');
    if trimmed.is_empty() {
        "_".to_owned()
    } else {
        trimmed.to_owned()
    }
}
