//! The coordinator service.

use super::status::OutcomeRing;
use super::{
    OrchestratorError, OrchestratorResult, OutcomeRecord, PlatformAlert, PlatformAlertSink,
    StatusSnapshot,
};
use crate::admission::{AdmissionController, Lease, Ticket};
use crate::config::ForemanConfig;
use crate::dispatch::domain::InboundEvent;
use crate::dispatch::ports::EventStore;
use crate::dispatch::services::Dispatcher;
use crate::output::WorkerResult;
use crate::retry::{DeadLetterReason, RetryDecision, RetryPolicy};
use crate::supervisor::{AttemptOutcome, ProcessSupervisor, RunReport, SupervisorError, Timeouts};
use crate::task::domain::{
    Attempt, AttemptFailure, AttemptNumber, AttemptReport, AttemptStatus, Task, TaskId, TaskState,
};
use crate::task::ports::TaskRepository;
use crate::workspace::{Workspace, WorkspaceManager};
use chrono::{DateTime, Utc};
use mockable::Clock;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

/// Summary of [`Orchestrator::recover`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    /// Sandboxes left by a previous process and archived.
    pub swept: usize,
    /// Unfinished tasks returned to the admission queue.
    pub requeued: usize,
    /// Tasks whose successful attempt was recorded but not yet completed.
    pub completed: usize,
}

type TaskLock = Arc<tokio::sync::Mutex<()>>;

struct Inner<R, E, C>
where
    R: TaskRepository,
    E: EventStore,
    C: Clock + Send + Sync,
{
    tasks: Arc<R>,
    dispatcher: Dispatcher<R, E, C>,
    admission: AdmissionController,
    workspaces: WorkspaceManager,
    supervisor: ProcessSupervisor<C>,
    timeouts: Timeouts,
    retry: RetryPolicy,
    infra_retry_limit: u32,
    clock: Arc<C>,
    alerts: Arc<dyn PlatformAlertSink>,
    shutdown: CancellationToken,
    tracker: TaskTracker,
    locks: Mutex<HashMap<TaskId, TaskLock>>,
    running: Mutex<HashMap<TaskId, CancellationToken>>,
    infra_failures: Mutex<HashMap<TaskId, u32>>,
    recent: Mutex<OutcomeRing>,
}

/// Runs the task pipeline end to end.
///
/// Cloning is cheap and every clone drives the same pipeline.
pub struct Orchestrator<R, E, C>
where
    R: TaskRepository,
    E: EventStore,
    C: Clock + Send + Sync,
{
    inner: Arc<Inner<R, E, C>>,
}

impl<R, E, C> Clone for Orchestrator<R, E, C>
where
    R: TaskRepository,
    E: EventStore,
    C: Clock + Send + Sync,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

fn guard<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

const fn ticket_for(task: &Task) -> Ticket {
    Ticket::new(task.id(), task.priority(), task.queued_at())
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

impl<R, E, C> Orchestrator<R, E, C>
where
    R: TaskRepository + 'static,
    E: EventStore + 'static,
    C: Clock + Send + Sync + 'static,
{
    /// Builds the pipeline and spawns the admission actor.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::Config`] when `config` fails validation.
    pub fn new(
        config: &ForemanConfig,
        tasks: Arc<R>,
        events: Arc<E>,
        clock: Arc<C>,
        alerts: Arc<dyn PlatformAlertSink>,
    ) -> OrchestratorResult<Self> {
        config.validate()?;
        let dispatcher = Dispatcher::new(
            Arc::clone(&tasks),
            events,
            Arc::clone(&clock),
            config.dispatch.routing_table()?,
            Arc::new(config.dispatch.priority_policy()),
        )
        .with_settings(config.dispatch.settings(config.retry.default_max_retries));
        let admission = AdmissionController::spawn(
            config.admission.capacity,
            config.admission.starvation_age(),
            Arc::clone(&clock),
        );
        let workspaces =
            WorkspaceManager::new(config.workspace.settings(), config.workspace.prompts());
        let supervisor = ProcessSupervisor::new(config.supervisor.command(), Arc::clone(&clock));

        Ok(Self {
            inner: Arc::new(Inner {
                tasks,
                dispatcher,
                admission,
                workspaces,
                supervisor,
                timeouts: config.supervisor.timeouts(),
                retry: RetryPolicy::new(config.retry.backoff()),
                infra_retry_limit: config.retry.infra_retry_limit,
                clock,
                alerts,
                shutdown: CancellationToken::new(),
                tracker: TaskTracker::new(),
                locks: Mutex::new(HashMap::new()),
                running: Mutex::new(HashMap::new()),
                infra_failures: Mutex::new(HashMap::new()),
                recent: Mutex::new(OutcomeRing::default()),
            }),
        })
    }

    /// Returns the task repository.
    #[must_use]
    pub fn tasks(&self) -> &R {
        &self.inner.tasks
    }

    /// Returns the sandbox manager.
    #[must_use]
    pub fn workspaces(&self) -> &WorkspaceManager {
        &self.inner.workspaces
    }

    /// Logs an event and queues the task it creates, if any.
    ///
    /// Returns `None` for unroutable and duplicate events.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::Dispatch`] when intake persistence fails
    /// and [`OrchestratorError::Admission`] when the admission actor is gone.
    pub async fn submit(&self, event: &InboundEvent) -> OrchestratorResult<Option<TaskId>> {
        let Some(task) = self.inner.dispatcher.dispatch(event).await? else {
            return Ok(None);
        };
        self.inner.admission.enqueue(ticket_for(&task)).await?;
        Ok(Some(task.id()))
    }

    /// Re-runs intake over logged events received at or after `since` and
    /// queues any tasks that were never created.
    ///
    /// # Errors
    ///
    /// Same as [`Orchestrator::submit`].
    pub async fn replay(&self, since: DateTime<Utc>) -> OrchestratorResult<Vec<TaskId>> {
        let report = self.inner.dispatcher.replay(since).await?;
        let mut queued = Vec::with_capacity(report.created.len());
        for task in &report.created {
            self.inner.admission.enqueue(ticket_for(task)).await?;
            queued.push(task.id());
        }
        info!(replayed = report.replayed, created = queued.len(), "event replay finished");
        Ok(queued)
    }

    /// Restores a consistent state after a restart.
    ///
    /// Archives sandboxes left by the previous process, closes attempts it
    /// left running, and queues every unfinished task again. Call before
    /// [`Orchestrator::run`].
    ///
    /// # Errors
    ///
    /// Returns an error when the sweep, the repository or the admission
    /// actor fails.
    pub async fn recover(&self) -> OrchestratorResult<RecoveryReport> {
        let mut report = RecoveryReport {
            swept: self.inner.workspaces.sweep_orphans().await?,
            ..RecoveryReport::default()
        };
        let unfinished = self
            .inner
            .tasks
            .find_by_states(&[
                TaskState::Queued,
                TaskState::Admitted,
                TaskState::AttemptRunning,
                TaskState::AttemptSucceeded,
                TaskState::AttemptFailed,
                TaskState::AttemptTimedOut,
            ])
            .await?;

        for stored in unfinished {
            let lock = self.task_lock(stored.id());
            let _held = lock.lock().await;
            let mut task = stored;
            match task.state() {
                TaskState::AttemptSucceeded => {
                    task.complete(self.inner.clock.as_ref())?;
                    self.inner.tasks.update(&task).await?;
                    self.record_outcome(&task, None);
                    self.forget(task.id());
                    report.completed = report.completed.saturating_add(1);
                    continue;
                }
                TaskState::AttemptRunning => self.close_interrupted_attempt(&task).await?,
                _ => {}
            }
            if task.state() != TaskState::Queued {
                task.requeue(self.inner.clock.utc(), self.inner.clock.as_ref())?;
                self.inner.tasks.update(&task).await?;
            }
            self.inner.admission.enqueue(ticket_for(&task)).await?;
            report.requeued = report.requeued.saturating_add(1);
        }
        info!(
            swept = report.swept,
            requeued = report.requeued,
            completed = report.completed,
            "recovery finished"
        );
        Ok(report)
    }

    /// Admits and runs tasks until [`Orchestrator::shutdown`] is called, then
    /// waits for in-flight attempts to finish.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::Admission`] if the admission actor stops.
    pub async fn run(&self) -> OrchestratorResult<()> {
        info!(
            capacity = self.inner.admission.status().capacity,
            "orchestrator running"
        );
        loop {
            // A lease handed over just as shutdown wins is dropped here. Its
            // task stays `queued` in the repository until the next recover.
            let lease = tokio::select! {
                () = self.inner.shutdown.cancelled() => break,
                admitted = self.inner.admission.admit() => admitted?,
            };
            let this = self.clone();
            self.inner.tracker.spawn(async move { this.execute(lease).await });
        }
        self.inner.tracker.close();
        self.inner.tracker.wait().await;
        info!("orchestrator stopped");
        Ok(())
    }

    /// Stops admitting new attempts.
    ///
    /// Running attempts finish normally; pending backoff requeues are dropped
    /// and picked up by the next [`Orchestrator::recover`].
    pub fn shutdown(&self) {
        self.inner.shutdown.cancel();
    }

    /// Cancels a task. Cancellation is terminal.
    ///
    /// A queued task is withdrawn, a running attempt is terminated, and the
    /// task is dead-lettered either way. Returns `false` when the task has
    /// already finished.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::NotFound`] for unknown tasks.
    pub async fn cancel(&self, task_id: TaskId) -> OrchestratorResult<bool> {
        let lock = self.task_lock(task_id);
        let _held = lock.lock().await;
        let task = self.load(task_id).await?;
        match task.state() {
            TaskState::Queued => {
                self.inner.admission.withdraw(task_id).await?;
                self.dead_letter(task, &DeadLetterReason::Cancelled).await?;
                Ok(true)
            }
            TaskState::Admitted | TaskState::AttemptRunning => {
                let token = guard(&self.inner.running).get(&task_id).cloned();
                if let Some(running) = token {
                    info!(task_id = %task_id, "cancellation requested");
                    running.cancel();
                } else {
                    self.dead_letter(task, &DeadLetterReason::Cancelled).await?;
                }
                Ok(true)
            }
            TaskState::AttemptFailed | TaskState::AttemptTimedOut => {
                self.dead_letter(task, &DeadLetterReason::Cancelled).await?;
                Ok(true)
            }
            TaskState::AttemptSucceeded
            | TaskState::Completed
            | TaskState::DeadLettered
            | TaskState::Archived => Ok(false),
        }
    }

    /// Moves a completed or dead-lettered task to `archived`.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::Domain`] for tasks that have not
    /// finished and [`OrchestratorError::NotFound`] for unknown tasks.
    pub async fn archive_task(&self, task_id: TaskId) -> OrchestratorResult<()> {
        let lock = self.task_lock(task_id);
        let _held = lock.lock().await;
        let mut task = self.load(task_id).await?;
        task.transition_to(TaskState::Archived, self.inner.clock.as_ref())?;
        self.inner.tasks.update(&task).await?;
        self.forget(task_id);
        Ok(())
    }

    /// Returns admission counts, running tasks and recent outcomes.
    #[must_use]
    pub fn status(&self) -> StatusSnapshot {
        let mut running: Vec<TaskId> = guard(&self.inner.running).keys().copied().collect();
        running.sort();
        StatusSnapshot {
            admission: self.inner.admission.status(),
            running,
            workspaces: self.inner.workspaces.stats(),
            recent: guard(&self.inner.recent).snapshot(),
        }
    }

    async fn execute(&self, lease: Lease) {
        let task_id = lease.task_id();
        if let Err(err) = self.drive(task_id).await {
            error!(task_id = %task_id, error = %err, "attempt bookkeeping failed");
        }
        guard(&self.inner.running).remove(&task_id);
        drop(lease);
    }

    async fn drive(&self, task_id: TaskId) -> OrchestratorResult<()> {
        let cancel = CancellationToken::new();
        let Some(task) = self.admit(task_id, &cancel).await? else {
            return Ok(());
        };
        if cancel.is_cancelled() {
            return self.abandon_cancelled(task_id).await;
        }

        let number = task.next_attempt_number();
        let workspace = match self.inner.workspaces.create(&task, number).await {
            Ok(workspace) => workspace,
            Err(err) => return self.settle_infrastructure(task_id, &cancel, err.to_string()).await,
        };

        let run = self.run_attempt(task_id, &workspace, &cancel).await;
        let status = match &run {
            Ok(Ok(report)) => report.outcome.status(),
            _ => AttemptStatus::Failed,
        };
        if let Err(err) = self.inner.workspaces.destroy(&workspace, status).await {
            warn!(
                task_id = %task_id,
                attempt = number.value(),
                error = %err,
                "sandbox teardown failed, leaving it for the orphan sweep"
            );
        }

        match run? {
            Ok(report) => self.conclude(task_id, number, report, &cancel).await,
            Err(err) => self.settle_infrastructure(task_id, &cancel, err.to_string()).await,
        }
    }

    pub(super) async fn admit(
        &self,
        task_id: TaskId,
        cancel: &CancellationToken,
    ) -> OrchestratorResult<Option<Task>> {
        let lock = self.task_lock(task_id);
        let _held = lock.lock().await;
        let Some(mut task) = self.inner.tasks.find_by_id(task_id).await? else {
            warn!(task_id = %task_id, "admitted task no longer exists");
            return Ok(None);
        };
        if task.state() != TaskState::Queued {
            debug!(task_id = %task_id, state = %task.state(), "ignoring stale admission");
            return Ok(None);
        }
        task.admit(self.inner.clock.as_ref())?;
        self.inner.tasks.update(&task).await?;
        guard(&self.inner.running).insert(task_id, cancel.clone());
        Ok(Some(task))
    }

    /// Dead-letters a task whose cancellation token fired before it
    /// produced a worker outcome.
    async fn abandon_cancelled(&self, task_id: TaskId) -> OrchestratorResult<()> {
        let lock = self.task_lock(task_id);
        let _held = lock.lock().await;
        guard(&self.inner.running).remove(&task_id);
        self.dead_letter_interrupted(task_id).await
    }

    /// Must be called with the task lock held.
    async fn dead_letter_interrupted(&self, task_id: TaskId) -> OrchestratorResult<()> {
        let task = self.load(task_id).await?;
        if matches!(task.state(), TaskState::Admitted | TaskState::AttemptRunning) {
            self.dead_letter(task, &DeadLetterReason::Cancelled).await?;
        }
        Ok(())
    }

    /// Handles a sandbox or spawn failure.
    ///
    /// The running token is dropped under the task lock, so a later
    /// [`Orchestrator::cancel`] dead-letters the task directly and an earlier
    /// one is honoured here instead of being retried.
    pub(super) async fn settle_infrastructure(
        &self,
        task_id: TaskId,
        cancel: &CancellationToken,
        message: String,
    ) -> OrchestratorResult<()> {
        let lock = self.task_lock(task_id);
        let _held = lock.lock().await;
        guard(&self.inner.running).remove(&task_id);
        if cancel.is_cancelled() {
            return self.dead_letter_interrupted(task_id).await;
        }
        self.infrastructure_failure(task_id, message);
        Ok(())
    }

    async fn run_attempt(
        &self,
        task_id: TaskId,
        workspace: &Workspace,
        cancel: &CancellationToken,
    ) -> OrchestratorResult<Result<RunReport, SupervisorError>> {
        let clock = self.inner.clock.as_ref();
        let mut attempt = {
            let lock = self.task_lock(task_id);
            let _held = lock.lock().await;
            let mut task = self.load(task_id).await?;
            task.begin_attempt(clock)?;
            self.inner.tasks.update(&task).await?;
            let attempt = Attempt::start(
                task_id,
                workspace.attempt(),
                workspace.log_path().as_str(),
                clock,
            );
            self.inner.tasks.record_attempt(&attempt).await?;
            attempt
        };
        info!(
            task_id = %task_id,
            attempt = workspace.attempt().value(),
            workspace = %workspace.root(),
            "attempt started"
        );

        let result = self
            .inner
            .supervisor
            .run(workspace, self.inner.timeouts, cancel)
            .await;
        let report = match &result {
            Ok(report) => report.to_attempt_report(),
            Err(err) => AttemptReport {
                status: AttemptStatus::Failed,
                failure: Some(AttemptFailure::Infrastructure {
                    message: err.to_string(),
                }),
                exit_code: None,
                last_activity_at: attempt.started_at,
                analysis_summary: None,
                declared_success: None,
            },
        };
        attempt.finish(report, clock);
        self.inner.tasks.record_attempt(&attempt).await?;
        Ok(result)
    }

    async fn conclude(
        &self,
        task_id: TaskId,
        number: AttemptNumber,
        report: RunReport,
        cancel: &CancellationToken,
    ) -> OrchestratorResult<()> {
        let lock = self.task_lock(task_id);
        let _held = lock.lock().await;
        guard(&self.inner.running).remove(&task_id);
        let task = self.load(task_id).await?;
        guard(&self.inner.infra_failures).remove(&task_id);

        let landing = match &report.outcome {
            AttemptOutcome::Succeeded(result) => return self.complete(task, number, result).await,
            AttemptOutcome::Failed(_) => Some(TaskState::AttemptFailed),
            AttemptOutcome::TimedOut(_) => Some(TaskState::AttemptTimedOut),
            AttemptOutcome::Killed => None,
        };
        // A cancellation that raced the worker's exit still ends the task.
        let failure = if cancel.is_cancelled() {
            AttemptFailure::Cancelled
        } else {
            report.outcome.failure().unwrap_or(AttemptFailure::Cancelled)
        };
        self.fail(task, number, &failure, landing).await
    }

    async fn complete(
        &self,
        mut task: Task,
        number: AttemptNumber,
        result: &WorkerResult,
    ) -> OrchestratorResult<()> {
        let clock = self.inner.clock.as_ref();
        let actions = result.to_actions(task.id(), number, clock.utc());
        self.inner.tasks.append_actions(&actions).await?;
        task.transition_to(TaskState::AttemptSucceeded, clock)?;
        task.complete(clock)?;
        self.inner.tasks.update(&task).await?;
        info!(
            task_id = %task.id(),
            attempt = number.value(),
            actions = actions.len(),
            dropped_actions = result.dropped_actions,
            declared_success = result.success,
            "task completed"
        );
        self.record_outcome(&task, None);
        self.forget(task.id());
        Ok(())
    }

    async fn fail(
        &self,
        mut task: Task,
        number: AttemptNumber,
        failure: &AttemptFailure,
        landing: Option<TaskState>,
    ) -> OrchestratorResult<()> {
        let clock = self.inner.clock.as_ref();
        if failure.is_charged() {
            task.charge_failure(failure.to_string(), clock);
        }
        let previous = self.previous_failure(task.id(), number).await?;
        let decision = self.inner.retry.decide(&task, previous.as_ref(), failure);
        if let Some(state) = landing {
            task.transition_to(state, clock)?;
        }

        match decision {
            RetryDecision::DeadLetter { reason } => self.dead_letter(task, &reason).await,
            RetryDecision::Retry { delay } => {
                self.inner.tasks.update(&task).await?;
                info!(
                    task_id = %task.id(),
                    attempt = number.value(),
                    retry_count = task.retry_count(),
                    delay_ms = millis(delay),
                    failure = %failure,
                    "attempt failed, retry scheduled"
                );
                self.schedule_requeue(task.id(), delay);
                Ok(())
            }
        }
    }

    async fn dead_letter(&self, mut task: Task, reason: &DeadLetterReason) -> OrchestratorResult<()> {
        let text = reason.to_string();
        task.dead_letter(text.as_str(), self.inner.clock.as_ref())?;
        self.inner.tasks.update(&task).await?;
        error!(
            task_id = %task.id(),
            attempts = task.attempts_started(),
            retry_count = task.retry_count(),
            reason = %text,
            "task dead-lettered"
        );
        self.inner.alerts.raise(PlatformAlert::DeadLettered {
            task_id: task.id(),
            reason: text.clone(),
        });
        self.record_outcome(&task, Some(text));
        self.forget(task.id());
        Ok(())
    }

    fn infrastructure_failure(&self, task_id: TaskId, message: String) {
        let failures = {
            let mut counts = guard(&self.inner.infra_failures);
            let count = counts.entry(task_id).or_insert(0);
            *count = count.saturating_add(1);
            *count
        };
        let delay = self.inner.retry.backoff().delay_for(failures);
        if failures > self.inner.infra_retry_limit {
            guard(&self.inner.infra_failures).remove(&task_id);
            self.inner.alerts.raise(PlatformAlert::Infrastructure {
                task_id,
                failures,
                message,
            });
        } else {
            warn!(
                task_id = %task_id,
                failures,
                delay_ms = millis(delay),
                error = %message,
                "infrastructure failure, retrying"
            );
        }
        self.schedule_requeue(task_id, delay);
    }

    fn schedule_requeue(&self, task_id: TaskId, delay: Duration) {
        let this = self.clone();
        self.inner.tracker.spawn(async move {
            tokio::select! {
                () = tokio::time::sleep(delay) => {}
                () = this.inner.shutdown.cancelled() => return,
            }
            if let Err(err) = this.requeue(task_id).await {
                error!(task_id = %task_id, error = %err, "requeue failed");
            }
        });
    }

    async fn requeue(&self, task_id: TaskId) -> OrchestratorResult<bool> {
        let lock = self.task_lock(task_id);
        let _held = lock.lock().await;
        let mut task = self.load(task_id).await?;
        if !matches!(
            task.state(),
            TaskState::Admitted
                | TaskState::AttemptRunning
                | TaskState::AttemptFailed
                | TaskState::AttemptTimedOut
        ) {
            debug!(task_id = %task_id, state = %task.state(), "requeue skipped");
            if task.state().is_terminal() {
                self.forget(task_id);
            }
            return Ok(false);
        }
        task.requeue(self.inner.clock.utc(), self.inner.clock.as_ref())?;
        self.inner.tasks.update(&task).await?;
        self.inner.admission.enqueue(ticket_for(&task)).await?;
        info!(task_id = %task_id, retry_count = task.retry_count(), "task requeued");
        Ok(true)
    }

    async fn close_interrupted_attempt(&self, task: &Task) -> OrchestratorResult<()> {
        let Ok(number) = AttemptNumber::new(task.attempts_started()) else {
            return Ok(());
        };
        let Some(mut attempt) = self.inner.tasks.find_attempt(task.id(), number).await? else {
            return Ok(());
        };
        if attempt.is_finished() {
            return Ok(());
        }
        let report = AttemptReport {
            status: AttemptStatus::Failed,
            failure: Some(AttemptFailure::Infrastructure {
                message: "coordinator restarted during the attempt".to_owned(),
            }),
            exit_code: None,
            last_activity_at: attempt.last_activity_at,
            analysis_summary: None,
            declared_success: None,
        };
        attempt.finish(report, self.inner.clock.as_ref());
        self.inner.tasks.record_attempt(&attempt).await?;
        Ok(())
    }

    async fn previous_failure(
        &self,
        task_id: TaskId,
        number: AttemptNumber,
    ) -> OrchestratorResult<Option<AttemptFailure>> {
        let Some(previous) = number
            .value()
            .checked_sub(1)
            .and_then(|value| AttemptNumber::new(value).ok())
        else {
            return Ok(None);
        };
        Ok(self
            .inner
            .tasks
            .find_attempt(task_id, previous)
            .await?
            .and_then(|attempt| attempt.failure))
    }

    async fn load(&self, task_id: TaskId) -> OrchestratorResult<Task> {
        self.inner
            .tasks
            .find_by_id(task_id)
            .await?
            .ok_or(OrchestratorError::NotFound(task_id))
    }

    fn task_lock(&self, task_id: TaskId) -> TaskLock {
        Arc::clone(guard(&self.inner.locks).entry(task_id).or_default())
    }

    /// Drops per-task bookkeeping once the task has finished. A later
    /// [`Self::task_lock`] call creates a fresh lock.
    fn forget(&self, task_id: TaskId) {
        guard(&self.inner.locks).remove(&task_id);
        guard(&self.inner.infra_failures).remove(&task_id);
    }

    #[cfg(test)]
    #[must_use]
    pub(super) fn tracked_tasks(&self) -> usize {
        guard(&self.inner.locks).len()
    }

    fn record_outcome(&self, task: &Task, reason: Option<String>) {
        guard(&self.inner.recent).push(OutcomeRecord {
            task_id: task.id(),
            state: task.state(),
            attempts: task.attempts_started(),
            reason,
            recorded_at: self.inner.clock.utc(),
        });
    }
}
