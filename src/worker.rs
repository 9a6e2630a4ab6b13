//! Worker command line and the environment handles passed to it.
//!
//! The worker is any executable. It runs inside the workspace root with the
//! prompt path as its final argument.

use crate::workspace::Workspace;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::process::Stdio;
use tokio::process::Command;

/// Environment variable naming the context directory.
pub const CONTEXT_DIR_ENV: &str = "FOREMAN_CONTEXT_DIR";
/// Environment variable naming the output directory.
pub const OUTPUT_DIR_ENV: &str = "FOREMAN_OUTPUT_DIR";
/// Environment variable naming the rendered prompt.
pub const PROMPT_PATH_ENV: &str = "FOREMAN_PROMPT_PATH";

/// Program, leading arguments and extra environment of the worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerCommand {
    /// Executable path or name resolved through `PATH`.
    pub program: String,
    /// Arguments placed before the prompt path.
    #[serde(default)]
    pub args: Vec<String>,
    /// Extra environment variables.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

impl WorkerCommand {
    /// Creates a command with no extra arguments or environment.
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: BTreeMap::new(),
        }
    }

    /// Appends leading arguments.
    #[must_use]
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Adds an environment variable.
    #[must_use]
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Builds the process for one attempt.
    ///
    /// Stdin is closed and both output streams are piped. On Unix the worker
    /// leads its own process group so termination reaches its children.
    #[must_use]
    pub fn build(&self, workspace: &Workspace) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .arg(workspace.prompt_path().as_str())
            .current_dir(workspace.root())
            .envs(&self.env)
            .env(CONTEXT_DIR_ENV, workspace.context_dir().as_str())
            .env(OUTPUT_DIR_ENV, workspace.output_dir().as_str())
            .env(PROMPT_PATH_ENV, workspace.prompt_path().as_str())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        command.process_group(0);
        command
    }

    /// Renders the command line for logs.
    #[must_use]
    pub fn display_for(&self, workspace: &Workspace) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .chain(std::iter::once(workspace.prompt_path().as_str()))
            .map(shell_escape)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Escapes a value for safe inclusion in a POSIX shell command.
///
/// Uses single-quote wrapping and the standard `'\''` sequence for embedded
/// quotes.
#[must_use]
pub fn shell_escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len() + 2);
    escaped.push('\'');
    for ch in value.chars() {
        if ch == '\'' {
            escaped.push_str("'\\''");
        } else {
            escaped.push(ch);
        }
    }
    escaped.push('\'');
    escaped
}
