//! Shared helpers for unit tests.

use crate::task::domain::{
    NewTask, Priority, ResourceId, SourceTag, Task, TaskOrigin, TaskType,
};
use chrono::{DateTime, Local, TimeDelta, TimeZone, Utc};
use mockable::Clock;
use serde_json::Map;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Clock that only moves when a test advances it.
#[derive(Debug, Clone)]
pub(crate) struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    pub(crate) fn starting_at(now: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(now)),
        }
    }

    pub(crate) fn advance(&self, by: Duration) {
        let delta = TimeDelta::from_std(by).expect("duration fits in a time delta");
        let mut now = self.now.lock().expect("clock lock");
        *now += delta;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::starting_at(
            Utc.with_ymd_and_hms(2026, 1, 5, 9, 0, 0)
                .single()
                .expect("valid start time"),
        )
    }
}

impl Clock for ManualClock {
    fn local(&self) -> DateTime<Local> {
        self.utc().with_timezone(&Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        *self.now.lock().expect("clock lock")
    }
}

/// Builds a queued triage task for `resource` with the given retry budget.
pub(crate) fn sample_task(resource: &str, max_retries: u32, clock: &impl Clock) -> Task {
    Task::new(
        NewTask {
            origin: TaskOrigin {
                source: SourceTag::new("tracker").expect("valid source"),
                event_type: "issue.created".to_owned(),
                resource_id: ResourceId::new(resource).expect("valid resource"),
                dedupe_key: format!("key-{resource}"),
            },
            task_type: TaskType::new("triage").expect("valid task type"),
            priority: Priority::NORMAL,
            context: Map::new(),
            repository: None,
            max_retries,
        },
        clock,
    )
}
