//! Unit tests for the task bounded context.

mod state_transition_tests;

use crate::task::domain::{
    NewTask, Priority, ResourceId, SourceTag, Task, TaskOrigin, TaskType,
};
use mockable::DefaultClock;
use rstest::fixture;
use serde_json::{Map, json};

/// Queued triage task with a three-retry budget.
#[fixture]
pub(super) fn queued_task() -> Task {
    let mut context = Map::new();
    context.insert("title".to_owned(), json!("Login page returns 500"));
    Task::new(
        NewTask {
            origin: TaskOrigin {
                source: SourceTag::new("tracker").expect("valid source tag"),
                event_type: "issue.created".to_owned(),
                resource_id: ResourceId::new("X-1").expect("valid resource id"),
                dedupe_key: "dedupe".to_owned(),
            },
            task_type: TaskType::new("triage").expect("valid task type"),
            priority: Priority::NORMAL,
            context,
            repository: None,
            max_retries: 3,
        },
        &DefaultClock,
    )
}
