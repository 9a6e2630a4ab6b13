//! In-memory repository for tasks, attempts and actions.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

use crate::task::{
    domain::{Action, Attempt, AttemptNumber, Task, TaskId, TaskState},
    ports::{TaskRepository, TaskRepositoryError, TaskRepositoryResult},
};

/// Thread-safe in-memory task repository.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTaskRepository {
    state: Arc<RwLock<InMemoryTaskState>>,
}

#[derive(Debug, Default)]
struct InMemoryTaskState {
    tasks: HashMap<TaskId, Task>,
    attempts: HashMap<TaskId, BTreeMap<AttemptNumber, Attempt>>,
    actions: HashMap<TaskId, Vec<Action>>,
    action_ids: HashSet<Uuid>,
}

impl InMemoryTaskRepository {
    /// Creates an empty in-memory repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> TaskRepositoryResult<RwLockReadGuard<'_, InMemoryTaskState>> {
        self.state.read().map_err(|err| {
            TaskRepositoryError::persistence(std::io::Error::other(err.to_string()))
        })
    }

    fn write(&self) -> TaskRepositoryResult<RwLockWriteGuard<'_, InMemoryTaskState>> {
        self.state.write().map_err(|err| {
            TaskRepositoryError::persistence(std::io::Error::other(err.to_string()))
        })
    }
}

#[async_trait]
impl TaskRepository for InMemoryTaskRepository {
    async fn store(&self, task: &Task) -> TaskRepositoryResult<()> {
        let mut state = self.write()?;
        if state.tasks.contains_key(&task.id()) {
            return Err(TaskRepositoryError::DuplicateTask(task.id()));
        }
        state.tasks.insert(task.id(), task.clone());
        Ok(())
    }

    async fn update(&self, task: &Task) -> TaskRepositoryResult<()> {
        let mut state = self.write()?;
        let stored = state
            .tasks
            .get_mut(&task.id())
            .ok_or(TaskRepositoryError::NotFound(task.id()))?;
        *stored = task.clone();
        Ok(())
    }

    async fn find_by_id(&self, id: TaskId) -> TaskRepositoryResult<Option<Task>> {
        let state = self.read()?;
        Ok(state.tasks.get(&id).cloned())
    }

    async fn find_by_states(&self, states: &[TaskState]) -> TaskRepositoryResult<Vec<Task>> {
        let state = self.read()?;
        let mut found: Vec<Task> = state
            .tasks
            .values()
            .filter(|task| states.contains(&task.state()))
            .cloned()
            .collect();
        found.sort_by_key(|task| (task.created_at(), task.id()));
        Ok(found)
    }

    async fn record_attempt(&self, attempt: &Attempt) -> TaskRepositoryResult<()> {
        let mut state = self.write()?;
        if !state.tasks.contains_key(&attempt.task_id) {
            return Err(TaskRepositoryError::NotFound(attempt.task_id));
        }
        state
            .attempts
            .entry(attempt.task_id)
            .or_default()
            .insert(attempt.number, attempt.clone());
        Ok(())
    }

    async fn attempts_for(&self, task_id: TaskId) -> TaskRepositoryResult<Vec<Attempt>> {
        let state = self.read()?;
        Ok(state
            .attempts
            .get(&task_id)
            .map(|attempts| attempts.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn find_attempt(
        &self,
        task_id: TaskId,
        number: AttemptNumber,
    ) -> TaskRepositoryResult<Option<Attempt>> {
        let state = self.read()?;
        Ok(state
            .attempts
            .get(&task_id)
            .and_then(|attempts| attempts.get(&number))
            .cloned())
    }

    async fn append_actions(&self, actions: &[Action]) -> TaskRepositoryResult<()> {
        let mut state = self.write()?;
        if let Some(duplicate) = actions
            .iter()
            .find(|action| state.action_ids.contains(&action.id()))
        {
            return Err(TaskRepositoryError::DuplicateAction(duplicate.id()));
        }
        for action in actions {
            state.action_ids.insert(action.id());
            state
                .actions
                .entry(action.task_id())
                .or_default()
                .push(action.clone());
        }
        Ok(())
    }

    async fn actions_for(&self, task_id: TaskId) -> TaskRepositoryResult<Vec<Action>> {
        let state = self.read()?;
        Ok(state.actions.get(&task_id).cloned().unwrap_or_default())
    }
}
