//! Shared harness for foreman integration tests.
//!
//! Each [`Site`] owns a temporary directory holding a `/bin/sh` worker
//! script plus the workspace and archive roots of one orchestrator.

use std::fs;
use std::sync::Arc;
use std::time::Duration;

use camino::Utf8PathBuf;
use chrono::Utc;
use foreman::config::ForemanConfig;
use foreman::dispatch::adapters::memory::InMemoryEventStore;
use foreman::dispatch::domain::{InboundEvent, Route};
use foreman::orchestrator::{Orchestrator, OrchestratorResult, PlatformAlertSink, TracingAlertSink};
use foreman::task::adapters::memory::InMemoryTaskRepository;
use foreman::task::domain::{Task, TaskId};
use foreman::task::ports::TaskRepository;
use mockable::DefaultClock;
use serde_json::json;
use tempfile::TempDir;
use tokio::task::JoinHandle;

/// Orchestrator wired to in-memory adapters.
pub type TestOrchestrator = Orchestrator<InMemoryTaskRepository, InMemoryEventStore, DefaultClock>;

/// Result document declaring one well-formed action.
pub const VALID_RESULT: &str = r#"{"success": true, "analysis_summary": "triaged", "actions": [{"type": "label_added", "platform": "tracker", "target_resource_id": "X-1"}]}"#;

/// Upper bound on how long a test waits for a task to settle.
const SETTLE_LIMIT: Duration = Duration::from_secs(15);

/// Temporary deployment of one orchestrator.
pub struct Site {
    _temp: TempDir,
    /// UTF-8 path of the temporary directory.
    pub base: Utf8PathBuf,
    /// Configuration used by [`Site::orchestrator`].
    pub config: ForemanConfig,
}

impl Site {
    /// Lays out a site whose worker runs `script` under `/bin/sh`.
    ///
    /// Deadlines are short and backoff jitter is disabled so retries settle
    /// quickly.
    ///
    /// # Errors
    ///
    /// Returns an error if the temporary directory or script cannot be
    /// created.
    pub fn with_worker(script: &str) -> eyre::Result<Self> {
        let _installed = foreman::telemetry::init_test_tracing();
        let temp = TempDir::new()?;
        let base = Utf8PathBuf::from_path_buf(temp.path().to_path_buf())
            .map_err(|path| eyre::eyre!("temporary path is not UTF-8: {}", path.display()))?;
        let script_path = base.join("worker.sh");
        fs::write(&script_path, script)?;

        let mut config = ForemanConfig::default();
        config.admission.capacity = 2;
        config.workspace.root = base.join("workspaces");
        config.workspace.archive_root = base.join("archive");
        config.supervisor.program = "/bin/sh".to_owned();
        config.supervisor.args = vec![script_path.to_string()];
        config.supervisor.idle_timeout_ms = 5_000;
        config.supervisor.hard_timeout_ms = 10_000;
        config.supervisor.grace_period_ms = 200;
        config.retry.base_delay_ms = 10;
        config.retry.max_delay_ms = 50;
        config.retry.jitter_percent = 0;
        config.dispatch.routes = vec![Route::new("tracker", "*", "triage")];

        Ok(Self {
            _temp: temp,
            base,
            config,
        })
    }

    /// Builds an orchestrator that logs platform alerts.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is rejected.
    pub fn orchestrator(&self) -> eyre::Result<TestOrchestrator> {
        self.orchestrator_with_alerts(Arc::new(TracingAlertSink))
    }

    /// Builds an orchestrator that raises alerts through `alerts`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is rejected.
    pub fn orchestrator_with_alerts(
        &self,
        alerts: Arc<dyn PlatformAlertSink>,
    ) -> eyre::Result<TestOrchestrator> {
        let orchestrator = Orchestrator::new(
            &self.config,
            Arc::new(InMemoryTaskRepository::new()),
            Arc::new(InMemoryEventStore::new()),
            Arc::new(DefaultClock),
            alerts,
        )?;
        Ok(orchestrator)
    }
}

/// Worker script that writes `document` to the result slot and exits zero.
#[must_use]
pub fn result_script(document: &str) -> String {
    format!("echo working\nprintf '%s' '{document}' > \"$FOREMAN_OUTPUT_DIR/result.json\"\n")
}

/// Tracker event announcing a new issue on `resource`.
#[must_use]
pub fn issue_event(resource: &str) -> InboundEvent {
    InboundEvent::new("tracker", "issue.created", resource, Utc::now())
        .with_payload(json!({"title": "Crash on start", "repository": "acme/widgets"}))
}

/// Starts the run loop on a background task.
#[must_use]
pub fn spawn_runner(orchestrator: &TestOrchestrator) -> JoinHandle<OrchestratorResult<()>> {
    let runner = orchestrator.clone();
    tokio::spawn(async move { runner.run().await })
}

/// Polls the repository until the task satisfies `done`.
///
/// # Errors
///
/// Returns an error if the task is missing, the repository fails, or the
/// task does not settle in time.
pub async fn wait_for(
    orchestrator: &TestOrchestrator,
    task_id: TaskId,
    done: impl Fn(&Task) -> bool,
) -> eyre::Result<Task> {
    let deadline = tokio::time::Instant::now() + SETTLE_LIMIT;
    loop {
        let task = orchestrator
            .tasks()
            .find_by_id(task_id)
            .await?
            .ok_or_else(|| eyre::eyre!("task {task_id} not found"))?;
        if done(&task) {
            return Ok(task);
        }
        eyre::ensure!(
            tokio::time::Instant::now() < deadline,
            "task {task_id} stuck in {}",
            task.state()
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

/// Checks one workspace per attempt, each destroyed, with no two attempts
/// of the task overlapping in time.
///
/// # Errors
///
/// Returns an error describing the first broken expectation.
pub async fn ensure_serial_attempts(
    orchestrator: &TestOrchestrator,
    task_id: TaskId,
) -> eyre::Result<()> {
    let attempts = orchestrator.tasks().attempts_for(task_id).await?;
    let stats = orchestrator.workspaces().stats();
    let count = u64::try_from(attempts.len())?;
    eyre::ensure!(
        stats.created == count && stats.destroyed == count,
        "workspace accounting {stats:?} for {count} attempts"
    );
    for pair in attempts.windows(2) {
        let [earlier, later] = pair else {
            continue;
        };
        let finished = earlier
            .finished_at
            .ok_or_else(|| eyre::eyre!("attempt {} never finished", earlier.number))?;
        eyre::ensure!(
            later.started_at >= finished,
            "attempt {} started before attempt {} finished",
            later.number,
            earlier.number
        );
    }
    Ok(())
}
