//! Typed configuration with defaults and validation.
//!
//! Every section deserialises with defaults for missing fields, so an empty
//! JSON object is a complete configuration apart from the worker program.
//!
//! # Examples
//!
//! ```
//! use foreman::config::ForemanConfig;
//!
//! let config = ForemanConfig::from_json_str(r#"{"supervisor": {"program": "agent"}}"#)
//!     .expect("valid configuration");
//! assert_eq!(config.admission.capacity, 4);
//! ```

use crate::dispatch::domain::{KeywordPriority, Route, RoutingTable};
use crate::dispatch::services::DispatchSettings;
use crate::retry::BackoffPolicy;
use crate::supervisor::Timeouts;
use crate::task::domain::{Priority, TaskDomainError};
use crate::worker::WorkerCommand;
use crate::workspace::{PromptRenderer, WorkspaceSettings};
use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;

/// Configuration problems.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The document is not valid JSON or has mistyped fields.
    #[error("invalid configuration document: {0}")]
    Parse(#[from] serde_json::Error),
    /// A value is out of range.
    #[error("invalid `{field}`: {reason}")]
    Invalid {
        /// Dotted path of the offending field.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },
    /// A route names an invalid source or task type.
    #[error("invalid route: {0}")]
    Route(#[from] TaskDomainError),
}

impl ConfigError {
    fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

/// Admission slots and starvation guard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdmissionConfig {
    /// Concurrent attempt slots.
    pub capacity: usize,
    /// Queue wait after which a task is promoted one priority band.
    pub starvation_age_ms: u64,
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            capacity: 4,
            starvation_age_ms: 60_000,
        }
    }
}

impl AdmissionConfig {
    /// Returns the starvation age as a duration.
    #[must_use]
    pub const fn starvation_age(&self) -> Duration {
        Duration::from_millis(self.starvation_age_ms)
    }
}

/// Sandbox locations and prompt templates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceConfig {
    /// Parent directory of live sandboxes.
    pub root: Utf8PathBuf,
    /// Parent directory of archived attempts.
    pub archive_root: Utf8PathBuf,
    /// Archive successful attempts as well.
    pub archive_on_success: bool,
    /// Prompt templates keyed by task type.
    pub templates: BTreeMap<String, String>,
    /// Template for task types without their own.
    pub fallback_template: Option<String>,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        let base = Utf8PathBuf::from_path_buf(std::env::temp_dir())
            .unwrap_or_else(|_| Utf8PathBuf::from("/tmp"))
            .join("foreman");
        Self {
            root: base.join("workspaces"),
            archive_root: base.join("archive"),
            archive_on_success: false,
            templates: BTreeMap::new(),
            fallback_template: None,
        }
    }
}

impl WorkspaceConfig {
    /// Returns the sandbox manager settings.
    #[must_use]
    pub fn settings(&self) -> WorkspaceSettings {
        WorkspaceSettings {
            root: self.root.clone(),
            archive_root: self.archive_root.clone(),
            archive_on_success: self.archive_on_success,
        }
    }

    /// Builds the prompt renderer.
    #[must_use]
    pub fn prompts(&self) -> PromptRenderer {
        let renderer = self
            .templates
            .iter()
            .fold(PromptRenderer::new(), |renderer, (task_type, template)| {
                renderer.with_template(task_type.as_str(), template.as_str())
            });
        match &self.fallback_template {
            Some(template) => renderer.with_fallback(template.as_str()),
            None => renderer,
        }
    }
}

/// Worker program and its deadlines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    /// Worker executable.
    pub program: String,
    /// Arguments placed before the prompt path.
    pub args: Vec<String>,
    /// Extra environment for the worker.
    pub env: BTreeMap<String, String>,
    /// Longest allowed silence on the worker's output.
    pub idle_timeout_ms: u64,
    /// Longest allowed run time.
    pub hard_timeout_ms: u64,
    /// Time between SIGTERM and SIGKILL.
    pub grace_period_ms: u64,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            program: String::new(),
            args: Vec::new(),
            env: BTreeMap::new(),
            idle_timeout_ms: 300_000,
            hard_timeout_ms: 1_800_000,
            grace_period_ms: 10_000,
        }
    }
}

impl SupervisorConfig {
    /// Returns the worker command line.
    #[must_use]
    pub fn command(&self) -> WorkerCommand {
        WorkerCommand {
            program: self.program.clone(),
            args: self.args.clone(),
            env: self.env.clone(),
        }
    }

    /// Returns the attempt deadlines.
    #[must_use]
    pub const fn timeouts(&self) -> Timeouts {
        Timeouts {
            idle: Duration::from_millis(self.idle_timeout_ms),
            hard: Duration::from_millis(self.hard_timeout_ms),
            grace: Duration::from_millis(self.grace_period_ms),
        }
    }
}

/// Backoff and retry budgets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Delay before the first retry.
    pub base_delay_ms: u64,
    /// Delay cap before jitter.
    pub max_delay_ms: u64,
    /// Growth factor per retry.
    pub multiplier: u32,
    /// Maximum jitter as a percentage of the delay.
    pub jitter_percent: u8,
    /// Retry budget of new tasks.
    pub default_max_retries: u32,
    /// Local retries of infrastructure errors before alerting.
    pub infra_retry_limit: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: 1_000,
            max_delay_ms: 30_000,
            multiplier: 2,
            jitter_percent: 20,
            default_max_retries: 3,
            infra_retry_limit: 3,
        }
    }
}

impl RetryConfig {
    /// Returns the backoff parameters.
    #[must_use]
    pub const fn backoff(&self) -> BackoffPolicy {
        BackoffPolicy {
            base: Duration::from_millis(self.base_delay_ms),
            cap: Duration::from_millis(self.max_delay_ms),
            multiplier: self.multiplier,
            jitter_percent: self.jitter_percent,
        }
    }
}

/// Event intake settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Deduplication window.
    pub dedup_window_ms: u64,
    /// Routes from `(source, event type)` to task type.
    pub routes: Vec<Route>,
    /// Severity keywords and their priorities; empty selects the built-in
    /// bands.
    pub priority_keywords: BTreeMap<String, u8>,
    /// Priority when no keyword matches.
    pub fallback_priority: u8,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            dedup_window_ms: 300_000,
            routes: Vec::new(),
            priority_keywords: BTreeMap::new(),
            fallback_priority: Priority::NORMAL.value(),
        }
    }
}

impl DispatchConfig {
    /// Compiles the routing table.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Route`] for a blank source or invalid task type.
    pub fn routing_table(&self) -> Result<RoutingTable, ConfigError> {
        Ok(RoutingTable::new(self.routes.iter().cloned())?)
    }

    /// Builds the keyword priority policy.
    #[must_use]
    pub fn priority_policy(&self) -> KeywordPriority {
        if self.priority_keywords.is_empty() {
            return KeywordPriority::severity_defaults();
        }
        KeywordPriority::new(
            self.priority_keywords
                .iter()
                .map(|(keyword, priority)| (keyword, Priority::new(*priority))),
            Priority::new(self.fallback_priority),
        )
    }

    /// Returns the dispatcher settings for tasks with `default_max_retries`.
    #[must_use]
    pub const fn settings(&self, default_max_retries: u32) -> DispatchSettings {
        DispatchSettings {
            dedup_window: Duration::from_millis(self.dedup_window_ms),
            default_max_retries,
        }
    }
}

/// Complete orchestrator configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForemanConfig {
    /// Admission controller settings.
    pub admission: AdmissionConfig,
    /// Sandbox settings.
    pub workspace: WorkspaceConfig,
    /// Worker and deadline settings.
    pub supervisor: SupervisorConfig,
    /// Retry settings.
    pub retry: RetryConfig,
    /// Event intake settings.
    pub dispatch: DispatchConfig,
}

impl ForemanConfig {
    /// Parses and validates a JSON configuration document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed documents and the
    /// errors of [`ForemanConfig::validate`] for out-of-range values.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks value ranges and cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending field, or
    /// [`ConfigError::Route`] for an invalid route.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.admission.capacity == 0 {
            return Err(ConfigError::invalid("admission.capacity", "must be at least 1"));
        }
        if self.supervisor.program.trim().is_empty() {
            return Err(ConfigError::invalid("supervisor.program", "must not be empty"));
        }
        for (field, value) in [
            ("supervisor.idle_timeout_ms", self.supervisor.idle_timeout_ms),
            ("supervisor.hard_timeout_ms", self.supervisor.hard_timeout_ms),
            ("dispatch.dedup_window_ms", self.dispatch.dedup_window_ms),
        ] {
            if value == 0 {
                return Err(ConfigError::invalid(field, "must be positive"));
            }
        }
        if self.supervisor.hard_timeout_ms < self.supervisor.idle_timeout_ms {
            return Err(ConfigError::invalid(
                "supervisor.hard_timeout_ms",
                "must not be shorter than the idle timeout",
            ));
        }
        if self.retry.max_delay_ms < self.retry.base_delay_ms {
            return Err(ConfigError::invalid(
                "retry.max_delay_ms",
                "must not be shorter than the base delay",
            ));
        }
        if self.retry.multiplier == 0 {
            return Err(ConfigError::invalid("retry.multiplier", "must be at least 1"));
        }
        if self.retry.jitter_percent > 100 {
            return Err(ConfigError::invalid("retry.jitter_percent", "must not exceed 100"));
        }
        self.dispatch.routing_table()?;
        Ok(())
    }
}
