//! Row conversion tests for the `PostgreSQL` task adapter.

use super::repository::{row_to_attempt, row_to_task, to_attempt_row, to_task_row};
use crate::task::domain::{
    Attempt, AttemptFailure, AttemptNumber, AttemptReport, AttemptStatus, NewTask, Priority,
    RepositoryFullName, ResourceId, SourceTag, Task, TaskId, TaskOrigin, TaskState, TaskType,
};
use crate::task::ports::TaskRepositoryError;
use mockable::DefaultClock;
use rstest::{fixture, rstest};
use serde_json::{Map, Value, json};

#[fixture]
fn task() -> Task {
    let mut context = Map::new();
    context.insert("title".to_owned(), json!("Crash on start"));
    Task::new(
        NewTask {
            origin: TaskOrigin {
                source: SourceTag::new("tracker").expect("valid source"),
                event_type: "issue.created".to_owned(),
                resource_id: ResourceId::new("X-1").expect("valid resource"),
                dedupe_key: "abc".to_owned(),
            },
            task_type: TaskType::new("triage").expect("valid task type"),
            priority: Priority::new(2),
            context,
            repository: Some(RepositoryFullName::new("owner/repo").expect("valid repository")),
            max_retries: 3,
        },
        &DefaultClock,
    )
}

#[rstest]
fn task_row_preserves_lifecycle_fields(task: Task) {
    let mut admitted = task;
    admitted.admit(&DefaultClock).expect("queued task can be admitted");

    let row = to_task_row(&admitted).expect("task converts to row");
    assert_eq!(row.state, "admitted");
    assert_eq!(row.priority, 2);

    let restored = row_to_task(row).expect("row converts back");
    assert_eq!(restored, admitted);
    assert_eq!(restored.state(), TaskState::Admitted);
}

#[rstest]
fn task_row_with_non_object_context_is_rejected(task: Task) {
    let mut row = to_task_row(&task).expect("task converts to row");
    row.context = json!(["not", "an", "object"]);

    let result = row_to_task(row);

    assert!(matches!(result, Err(TaskRepositoryError::Persistence(_))));
}

#[rstest]
fn task_row_with_unknown_state_is_rejected(task: Task) {
    let mut row = to_task_row(&task).expect("task converts to row");
    row.state = "sleeping".to_owned();

    assert!(row_to_task(row).is_err());
}

#[rstest]
fn attempt_row_keeps_failure_payload() {
    let mut attempt = Attempt::start(
        TaskId::new(),
        AttemptNumber::first(),
        "/tmp/worker.log",
        &DefaultClock,
    );
    let last_activity_at = attempt.started_at;
    attempt.finish(
        AttemptReport {
            status: AttemptStatus::Failed,
            failure: Some(AttemptFailure::OutputInvalid {
                signature: "missing field `actions`".to_owned(),
            }),
            exit_code: Some(0),
            last_activity_at,
            analysis_summary: None,
            declared_success: None,
        },
        &DefaultClock,
    );

    let row = to_attempt_row(&attempt).expect("attempt converts to row");
    assert_eq!(row.status, "failed");
    assert_eq!(
        row.failure.as_ref().and_then(|value| value.get("kind")),
        Some(&Value::String("output_invalid".to_owned()))
    );

    let restored = row_to_attempt(row).expect("row converts back");
    assert_eq!(restored, attempt);
}
