//! Unit tests for the coordinator using in-memory adapters and `/bin/sh`
//! workers.


use crate::config::ForemanConfig;
use crate::dispatch::adapters::memory::InMemoryEventStore;
use crate::dispatch::domain::{InboundEvent, Route};
use crate::orchestrator::{Orchestrator, PlatformAlert, PlatformAlertSink};
use crate::task::adapters::memory::InMemoryTaskRepository;
use crate::task::domain::{Task, TaskId};
use crate::task::ports::TaskRepository;
use camino::Utf8PathBuf;
use chrono::Utc;
use mockable::DefaultClock;
use serde_json::json;
use std::fs;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

pub(super) type TestOrchestrator =
    Orchestrator<InMemoryTaskRepository, InMemoryEventStore, DefaultClock>;

pub(super) const VALID_RESULT: &str = r#"{"success": true, "analysis_summary": "triaged", "actions": [{"type": "label_added", "platform": "tracker", "target_resource_id": "X-1"}]}"#;

#[derive(Debug, Default)]
pub(super) struct RecordingAlerts {
    raised: Mutex<Vec<PlatformAlert>>,
}

impl RecordingAlerts {
    pub(super) fn raised(&self) -> Vec<PlatformAlert> {
        self.raised.lock().expect("alerts lock").clone()
    }
}

impl PlatformAlertSink for RecordingAlerts {
    fn raise(&self, alert: PlatformAlert) {
        self.raised.lock().expect("alerts lock").push(alert);
    }
}

pub(super) struct Site {
    pub(super) _temp: TempDir,
    pub(super) base: Utf8PathBuf,
    pub(super) config: ForemanConfig,
}

impl Site {
    /// Lays out a site whose worker runs `script` under `/bin/sh`.
    pub(super) fn with_worker(script: &str) -> Self {
        let _installed = crate::telemetry::init_test_tracing();
        let temp = TempDir::new().expect("temp dir");
        let base =
            Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).expect("utf-8 temp path");
        let script_path = base.join("worker.sh");
        fs::write(&script_path, script).expect("write worker script");

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
        Self {
            _temp: temp,
            base,
            config,
        }
    }

    pub(super) fn orchestrator(&self, alerts: Arc<dyn PlatformAlertSink>) -> TestOrchestrator {
        Orchestrator::new(
            &self.config,
            Arc::new(InMemoryTaskRepository::new()),
            Arc::new(InMemoryEventStore::new()),
            Arc::new(DefaultClock),
            alerts,
        )
        .expect("valid orchestrator configuration")
    }
}

pub(super) fn issue_event(resource: &str) -> InboundEvent {
    InboundEvent::new("tracker", "issue.created", resource, Utc::now())
        .with_payload(json!({"title": "Crash on start", "repository": "acme/widgets"}))
}

/// Polls until the stored task satisfies `done`.
pub(super) async fn wait_for(
    orchestrator: &TestOrchestrator,
    task_id: TaskId,
    done: impl Fn(&Task) -> bool,
) -> Task {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(15);
    loop {
        let task = orchestrator
            .tasks()
            .find_by_id(task_id)
            .await
            .expect("repository is readable")
            .expect("task exists");
        if done(&task) {
            return task;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "task never reached the expected state, last seen {}",
            task.state()
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

pub(super) fn spawn_runner(
    orchestrator: &TestOrchestrator,
) -> tokio::task::JoinHandle<crate::orchestrator::OrchestratorResult<()>> {
    let runner = orchestrator.clone();
    tokio::spawn(async move { runner.run().await })
}

/// Checks that every attempt had its own workspace, that each workspace was
/// torn down, and that attempts ran strictly one after another.
pub(super) async fn assert_serial_attempts(orchestrator: &TestOrchestrator, task_id: TaskId) {
    let attempts = orchestrator
        .tasks()
        .attempts_for(task_id)
        .await
        .expect("attempts");
    let stats = orchestrator.workspaces().stats();
    let count = u64::try_from(attempts.len()).expect("attempt count fits");
    assert_eq!(
        (stats.created, stats.destroyed),
        (count, count),
        "workspace accounting {stats:?} for {count} attempts"
    );
    for pair in attempts.windows(2) {
        let [earlier, later] = pair else {
            continue;
        };
        assert!(later.number > earlier.number);
        let finished = earlier.finished_at.expect("earlier attempt finished");
        assert!(
            later.started_at >= finished,
            "attempt {} started before attempt {} finished",
            later.number,
            earlier.number
        );
    }
}
