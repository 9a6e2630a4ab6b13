//! Event intake service: log, route, deduplicate and create tasks.

use crate::dispatch::{
    domain::{DedupeClaim, DedupeKey, InboundEvent, PriorityPolicy, RoutingTable},
    ports::{EventStore, EventStoreError},
};
use crate::task::{
    domain::{NewTask, RepositoryFullName, ResourceId, SourceTag, Task, TaskOrigin},
    ports::{TaskRepository, TaskRepositoryError},
};
use chrono::{DateTime, TimeDelta, Utc};
use mockable::Clock;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Service-level errors for event intake.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The event log or claim table failed.
    #[error(transparent)]
    EventStore(#[from] EventStoreError),
    /// Task persistence failed.
    #[error(transparent)]
    Repository(#[from] TaskRepositoryError),
}

/// Result type for dispatcher operations.
pub type DispatchResult<T> = Result<T, DispatchError>;

/// Tunables for deduplication and new tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchSettings {
    /// Window for dedupe buckets and per-resource collapsing.
    pub dedup_window: Duration,
    /// Retry budget given to new tasks.
    pub default_max_retries: u32,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            dedup_window: Duration::from_secs(300),
            default_max_retries: 3,
        }
    }
}

/// Summary of a replay run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplayReport {
    /// Events read back from the log.
    pub replayed: usize,
    /// Tasks created by the replay.
    pub created: Vec<Task>,
}

/// Turns inbound events into queued tasks.
pub struct Dispatcher<R, E, C>
where
    R: TaskRepository,
    E: EventStore,
    C: Clock + Send + Sync,
{
    tasks: Arc<R>,
    events: Arc<E>,
    clock: Arc<C>,
    routes: RoutingTable,
    priority: Arc<dyn PriorityPolicy>,
    settings: DispatchSettings,
    claim_gate: Mutex<()>,
}

impl<R, E, C> Dispatcher<R, E, C>
where
    R: TaskRepository,
    E: EventStore,
    C: Clock + Send + Sync,
{
    /// Creates a dispatcher with default settings.
    #[must_use]
    pub fn new(
        tasks: Arc<R>,
        events: Arc<E>,
        clock: Arc<C>,
        routes: RoutingTable,
        priority: Arc<dyn PriorityPolicy>,
    ) -> Self {
        Self {
            tasks,
            events,
            clock,
            routes,
            priority,
            settings: DispatchSettings::default(),
            claim_gate: Mutex::new(()),
        }
    }

    /// Replaces the dispatch settings.
    #[must_use]
    pub fn with_settings(mut self, settings: DispatchSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Returns the active settings.
    #[must_use]
    pub const fn settings(&self) -> DispatchSettings {
        self.settings
    }

    /// Logs an event and creates a task for it when it is routable and new.
    ///
    /// Returns `Ok(None)` when the event is unroutable or a duplicate. The
    /// raw event is always appended to the log first.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError`] when the event log, claim table or task
    /// repository fails.
    pub async fn dispatch(&self, event: &InboundEvent) -> DispatchResult<Option<Task>> {
        self.events.append(event).await?;
        self.enqueue(event).await
    }

    /// Re-dispatches every logged event received at or after `since`.
    ///
    /// Events are not appended again. Deduplication keeps the replay
    /// idempotent.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError`] on the first persistence failure.
    pub async fn replay(&self, since: DateTime<Utc>) -> DispatchResult<ReplayReport> {
        let stored = self.events.events_since(since).await?;
        let mut report = ReplayReport {
            replayed: stored.len(),
            created: Vec::new(),
        };
        for entry in stored {
            if let Some(task) = self.enqueue(&entry.event).await? {
                report.created.push(task);
            }
        }
        info!(
            replayed = report.replayed,
            created = report.created.len(),
            %since,
            "event replay finished"
        );
        Ok(report)
    }

    async fn enqueue(&self, event: &InboundEvent) -> DispatchResult<Option<Task>> {
        let (Ok(source), Ok(resource_id)) = (
            SourceTag::new(&event.source),
            ResourceId::new(&event.resource_id),
        ) else {
            info!(
                source = %event.source,
                event_type = %event.event_type,
                resource_id = %event.resource_id,
                "event has no usable source or resource; dropped"
            );
            return Ok(None);
        };
        let Some(task_type) = self.routes.resolve(&source, &event.event_type) else {
            info!(
                source = %source,
                event_type = %event.event_type,
                "no route for event; dropped"
            );
            return Ok(None);
        };

        let key = DedupeKey::compute(
            &source,
            &event.event_type,
            &resource_id,
            event.received_at,
            self.settings.dedup_window,
        );

        let _gate = self.claim_gate.lock().await;
        if let Some(previous) = self.events.latest_claim(&source, &resource_id).await? {
            if self.within_window(previous.received_at, event.received_at) {
                info!(
                    source = %source,
                    resource_id = %resource_id,
                    previous_task = %previous.task_id,
                    "event collapsed into recent task for the same resource"
                );
                return Ok(None);
            }
        }

        let task = Task::new(
            NewTask {
                origin: TaskOrigin {
                    source: source.clone(),
                    event_type: event.event_type.trim().to_owned(),
                    resource_id: resource_id.clone(),
                    dedupe_key: key.as_str().to_owned(),
                },
                task_type: task_type.clone(),
                priority: self.priority.assign(event, task_type),
                context: context_from_payload(&event.payload),
                repository: repository_from_payload(&event.payload),
                max_retries: self.settings.default_max_retries,
            },
            &*self.clock,
        );

        let claim = DedupeClaim {
            key: key.clone(),
            source,
            resource_id,
            task_id: task.id(),
            received_at: event.received_at,
        };
        if !self.events.claim(&claim).await? {
            info!(dedupe_key = %key, "duplicate event delivery; dropped");
            return Ok(None);
        }

        if let Err(err) = self.tasks.store(&task).await {
            if let Err(release_err) = self.events.release(&key).await {
                warn!(dedupe_key = %key, error = %release_err, "failed to release dedupe claim");
            }
            return Err(err.into());
        }

        info!(
            task_id = %task.id(),
            task_type = %task.task_type(),
            priority = %task.priority(),
            "task created from event"
        );
        Ok(Some(task))
    }

    fn within_window(&self, previous: DateTime<Utc>, current: DateTime<Utc>) -> bool {
        let window = TimeDelta::from_std(self.settings.dedup_window).unwrap_or(TimeDelta::MAX);
        (current - previous).abs() < window
    }
}

fn context_from_payload(payload: &Value) -> Map<String, Value> {
    match payload {
        Value::Object(map) => map.clone(),
        Value::Null => Map::new(),
        other => {
            let mut map = Map::new();
            map.insert("payload".to_owned(), other.clone());
            map
        }
    }
}

fn repository_from_payload(payload: &Value) -> Option<RepositoryFullName> {
    let raw = match payload.get("repository")? {
        Value::String(name) => name.as_str(),
        Value::Object(repo) => repo.get("full_name")?.as_str()?,
        _ => return None,
    };
    match RepositoryFullName::new(raw) {
        Ok(repository) => Some(repository),
        Err(err) => {
            warn!(repository = raw, error = %err, "ignoring malformed repository reference");
            None
        }
    }
}
