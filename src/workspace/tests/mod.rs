//! Unit tests for sandbox management.


use crate::task::domain::{
    NewTask, Priority, RepositoryFullName, ResourceId, SourceTag, Task, TaskOrigin, TaskType,
};
use crate::workspace::{PromptRenderer, WorkspaceManager, WorkspaceSettings};
use camino::Utf8PathBuf;
use mockable::DefaultClock;
use rstest::fixture;
use serde_json::{Map, json};
use tempfile::TempDir;

pub(super) struct Sandbox {
    pub(super) _temp: TempDir,
    pub(super) base: Utf8PathBuf,
    pub(super) manager: WorkspaceManager,
}

impl Sandbox {
    pub(super) fn settings(&self) -> WorkspaceSettings {
        self.manager.settings().clone()
    }
}

pub(super) fn manager_at(base: &Utf8PathBuf, prompts: PromptRenderer) -> WorkspaceManager {
    WorkspaceManager::new(
        WorkspaceSettings {
            root: base.join("workspaces"),
            archive_root: base.join("archive"),
            archive_on_success: false,
        },
        prompts,
    )
}

#[fixture]
pub(super) fn sandbox() -> Sandbox {
    let temp = TempDir::new().expect("temp dir");
    let base = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).expect("utf-8 temp path");
    let manager = manager_at(&base, PromptRenderer::new());
    Sandbox {
        _temp: temp,
        base,
        manager,
    }
}

#[fixture]
pub(super) fn task() -> Task {
    let mut context = Map::new();
    context.insert("issue".to_owned(), json!({"title": "Crash on start", "labels": ["bug"]}));
    context.insert("../escape".to_owned(), json!("kept inside"));
    Task::new(
        NewTask {
            origin: TaskOrigin {
                source: SourceTag::new("tracker").expect("valid source"),
                event_type: "issue.created".to_owned(),
                resource_id: ResourceId::new("X-1").expect("valid resource"),
                dedupe_key: "key".to_owned(),
            },
            task_type: TaskType::new("triage").expect("valid task type"),
            priority: Priority::new(2),
            context,
            repository: Some(RepositoryFullName::new("acme/widgets").expect("valid repository")),
            max_retries: 3,
        },
        &DefaultClock,
    )
}
