//! `PostgreSQL` repository implementation for task storage.

use super::{
    models::{ActionRow, AttemptRow, NewActionRow, TaskRow},
    schema::{actions, attempts, tasks},
};
use crate::task::{
    domain::{
        Action, ActionData, Attempt, AttemptFailure, AttemptNumber, AttemptStatus,
        PersistedTaskData, Priority, RepositoryFullName, Task, TaskDomainError, TaskId,
        TaskOrigin, TaskState, TaskType,
    },
    ports::{TaskRepository, TaskRepositoryError, TaskRepositoryResult},
};
use async_trait::async_trait;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use serde_json::Value;

/// `PostgreSQL` connection pool type used by task adapters.
pub type TaskPgPool = Pool<ConnectionManager<PgConnection>>;

/// `PostgreSQL`-backed task repository.
#[derive(Debug, Clone)]
pub struct PostgresTaskRepository {
    pool: TaskPgPool,
}

impl PostgresTaskRepository {
    /// Creates a new repository from a `PostgreSQL` connection pool.
    #[must_use]
    pub const fn new(pool: TaskPgPool) -> Self {
        Self { pool }
    }

    async fn run_blocking<F, T>(&self, f: F) -> TaskRepositoryResult<T>
    where
        F: FnOnce(&mut PgConnection) -> TaskRepositoryResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut connection = pool.get().map_err(TaskRepositoryError::persistence)?;
            f(&mut connection)
        })
        .await
        .map_err(TaskRepositoryError::persistence)?
    }
}

#[async_trait]
impl TaskRepository for PostgresTaskRepository {
    async fn store(&self, task: &Task) -> TaskRepositoryResult<()> {
        let task_id = task.id();
        let row = to_task_row(task)?;

        self.run_blocking(move |connection| {
            diesel::insert_into(tasks::table)
                .values(&row)
                .execute(connection)
                .map_err(|err| match err {
                    DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                        TaskRepositoryError::DuplicateTask(task_id)
                    }
                    _ => TaskRepositoryError::persistence(err),
                })?;
            Ok(())
        })
        .await
    }

    async fn update(&self, task: &Task) -> TaskRepositoryResult<()> {
        let task_id = task.id();
        let row = to_task_row(task)?;

        self.run_blocking(move |connection| {
            // Priority and context are fixed at creation and never rewritten.
            let updated = diesel::update(tasks::table.filter(tasks::id.eq(row.id)))
                .set((
                    tasks::state.eq(row.state),
                    tasks::retry_count.eq(row.retry_count),
                    tasks::attempts_started.eq(row.attempts_started),
                    tasks::last_failure.eq(row.last_failure),
                    tasks::queued_at.eq(row.queued_at),
                    tasks::updated_at.eq(row.updated_at),
                ))
                .execute(connection)
                .map_err(TaskRepositoryError::persistence)?;
            if updated == 0 {
                return Err(TaskRepositoryError::NotFound(task_id));
            }
            Ok(())
        })
        .await
    }

    async fn find_by_id(&self, id: TaskId) -> TaskRepositoryResult<Option<Task>> {
        self.run_blocking(move |connection| {
            let row = tasks::table
                .filter(tasks::id.eq(id.into_inner()))
                .select(TaskRow::as_select())
                .first::<TaskRow>(connection)
                .optional()
                .map_err(TaskRepositoryError::persistence)?;
            row.map(row_to_task).transpose()
        })
        .await
    }

    async fn find_by_states(&self, states: &[TaskState]) -> TaskRepositoryResult<Vec<Task>> {
        let state_names: Vec<String> = states
            .iter()
            .map(|state| state.as_str().to_owned())
            .collect();
        self.run_blocking(move |connection| {
            let rows = tasks::table
                .filter(tasks::state.eq_any(state_names))
                .order((tasks::created_at.asc(), tasks::id.asc()))
                .select(TaskRow::as_select())
                .load::<TaskRow>(connection)
                .map_err(TaskRepositoryError::persistence)?;
            rows.into_iter().map(row_to_task).collect()
        })
        .await
    }

    async fn record_attempt(&self, attempt: &Attempt) -> TaskRepositoryResult<()> {
        let task_id = attempt.task_id;
        let row = to_attempt_row(attempt)?;

        self.run_blocking(move |connection| {
            let changes = row.clone();
            diesel::insert_into(attempts::table)
                .values(&row)
                .on_conflict((attempts::task_id, attempts::attempt_number))
                .do_update()
                .set((
                    attempts::status.eq(changes.status),
                    attempts::last_activity_at.eq(changes.last_activity_at),
                    attempts::finished_at.eq(changes.finished_at),
                    attempts::failure.eq(changes.failure),
                    attempts::exit_code.eq(changes.exit_code),
                    attempts::analysis_summary.eq(changes.analysis_summary),
                    attempts::declared_success.eq(changes.declared_success),
                    attempts::log_path.eq(changes.log_path),
                ))
                .execute(connection)
                .map_err(|err| match err {
                    DieselError::DatabaseError(DatabaseErrorKind::ForeignKeyViolation, _) => {
                        TaskRepositoryError::NotFound(task_id)
                    }
                    _ => TaskRepositoryError::persistence(err),
                })?;
            Ok(())
        })
        .await
    }

    async fn attempts_for(&self, task_id: TaskId) -> TaskRepositoryResult<Vec<Attempt>> {
        self.run_blocking(move |connection| {
            let rows = attempts::table
                .filter(attempts::task_id.eq(task_id.into_inner()))
                .order(attempts::attempt_number.asc())
                .select(AttemptRow::as_select())
                .load::<AttemptRow>(connection)
                .map_err(TaskRepositoryError::persistence)?;
            rows.into_iter().map(row_to_attempt).collect()
        })
        .await
    }

    async fn find_attempt(
        &self,
        task_id: TaskId,
        number: AttemptNumber,
    ) -> TaskRepositoryResult<Option<Attempt>> {
        let attempt_number = to_i32(number.value())?;
        self.run_blocking(move |connection| {
            let row = attempts::table
                .filter(attempts::task_id.eq(task_id.into_inner()))
                .filter(attempts::attempt_number.eq(attempt_number))
                .select(AttemptRow::as_select())
                .first::<AttemptRow>(connection)
                .optional()
                .map_err(TaskRepositoryError::persistence)?;
            row.map(row_to_attempt).transpose()
        })
        .await
    }

    async fn append_actions(&self, new_actions: &[Action]) -> TaskRepositoryResult<()> {
        if new_actions.is_empty() {
            return Ok(());
        }
        let rows = new_actions
            .iter()
            .map(to_action_row)
            .collect::<TaskRepositoryResult<Vec<_>>>()?;

        self.run_blocking(move |connection| {
            let ids: Vec<uuid::Uuid> = rows.iter().map(|row| row.id).collect();
            let existing = actions::table
                .filter(actions::id.eq_any(ids))
                .select(actions::id)
                .first::<uuid::Uuid>(connection)
                .optional()
                .map_err(TaskRepositoryError::persistence)?;
            if let Some(duplicate) = existing {
                return Err(TaskRepositoryError::DuplicateAction(duplicate));
            }

            diesel::insert_into(actions::table)
                .values(&rows)
                .execute(connection)
                .map_err(TaskRepositoryError::persistence)?;
            Ok(())
        })
        .await
    }

    async fn actions_for(&self, task_id: TaskId) -> TaskRepositoryResult<Vec<Action>> {
        self.run_blocking(move |connection| {
            let rows = actions::table
                .filter(actions::task_id.eq(task_id.into_inner()))
                .order(actions::seq.asc())
                .select(ActionRow::as_select())
                .load::<ActionRow>(connection)
                .map_err(TaskRepositoryError::persistence)?;
            rows.into_iter().map(row_to_action).collect()
        })
        .await
    }
}

fn to_i32(value: u32) -> TaskRepositoryResult<i32> {
    i32::try_from(value).map_err(TaskRepositoryError::persistence)
}

fn to_u32(value: i32) -> TaskRepositoryResult<u32> {
    u32::try_from(value).map_err(TaskRepositoryError::persistence)
}

fn to_attempt_number(value: i32) -> TaskRepositoryResult<AttemptNumber> {
    AttemptNumber::new(to_u32(value)?).map_err(TaskRepositoryError::persistence)
}

pub(super) fn to_task_row(task: &Task) -> TaskRepositoryResult<TaskRow> {
    let origin = serde_json::to_value(task.origin()).map_err(TaskRepositoryError::persistence)?;

    Ok(TaskRow {
        id: task.id().into_inner(),
        origin,
        task_type: task.task_type().as_str().to_owned(),
        priority: i16::from(task.priority().value()),
        context: Value::Object(task.context().clone()),
        repository: task.repository().map(|repo| repo.as_str().to_owned()),
        state: task.state().as_str().to_owned(),
        retry_count: to_i32(task.retry_count())?,
        max_retries: to_i32(task.max_retries())?,
        attempts_started: to_i32(task.attempts_started())?,
        last_failure: task.last_failure().map(str::to_owned),
        queued_at: task.queued_at(),
        created_at: task.created_at(),
        updated_at: task.updated_at(),
    })
}

pub(super) fn row_to_task(row: TaskRow) -> TaskRepositoryResult<Task> {
    let origin = serde_json::from_value::<TaskOrigin>(row.origin)
        .map_err(TaskRepositoryError::persistence)?;
    let Value::Object(context) = row.context else {
        return Err(TaskRepositoryError::persistence(
            TaskDomainError::ContextNotObject,
        ));
    };
    let repository = row
        .repository
        .map(RepositoryFullName::new)
        .transpose()
        .map_err(TaskRepositoryError::persistence)?;
    let priority = u8::try_from(row.priority).map_err(TaskRepositoryError::persistence)?;

    let data = PersistedTaskData {
        id: TaskId::from_uuid(row.id),
        origin,
        task_type: TaskType::new(row.task_type).map_err(TaskRepositoryError::persistence)?,
        priority: Priority::new(priority),
        context,
        repository,
        state: TaskState::try_from(row.state.as_str())
            .map_err(TaskRepositoryError::persistence)?,
        retry_count: to_u32(row.retry_count)?,
        max_retries: to_u32(row.max_retries)?,
        attempts_started: to_u32(row.attempts_started)?,
        last_failure: row.last_failure,
        queued_at: row.queued_at,
        created_at: row.created_at,
        updated_at: row.updated_at,
    };
    Ok(Task::from_persisted(data))
}

pub(super) fn to_attempt_row(attempt: &Attempt) -> TaskRepositoryResult<AttemptRow> {
    let failure = attempt
        .failure
        .as_ref()
        .map(serde_json::to_value)
        .transpose()
        .map_err(TaskRepositoryError::persistence)?;

    Ok(AttemptRow {
        task_id: attempt.task_id.into_inner(),
        attempt_number: to_i32(attempt.number.value())?,
        status: attempt.status.as_str().to_owned(),
        started_at: attempt.started_at,
        last_activity_at: attempt.last_activity_at,
        finished_at: attempt.finished_at,
        failure,
        exit_code: attempt.exit_code,
        analysis_summary: attempt.analysis_summary.clone(),
        declared_success: attempt.declared_success,
        log_path: attempt.log_path.clone(),
    })
}

pub(super) fn row_to_attempt(row: AttemptRow) -> TaskRepositoryResult<Attempt> {
    let failure = row
        .failure
        .map(serde_json::from_value::<AttemptFailure>)
        .transpose()
        .map_err(TaskRepositoryError::persistence)?;

    Ok(Attempt {
        task_id: TaskId::from_uuid(row.task_id),
        number: to_attempt_number(row.attempt_number)?,
        status: AttemptStatus::try_from(row.status.as_str())
            .map_err(TaskRepositoryError::persistence)?,
        started_at: row.started_at,
        last_activity_at: row.last_activity_at,
        finished_at: row.finished_at,
        failure,
        exit_code: row.exit_code,
        analysis_summary: row.analysis_summary,
        declared_success: row.declared_success,
        log_path: row.log_path,
    })
}

fn to_action_row(action: &Action) -> TaskRepositoryResult<NewActionRow> {
    Ok(NewActionRow {
        id: action.id(),
        task_id: action.task_id().into_inner(),
        attempt_number: to_i32(action.attempt().value())?,
        action_type: action.action_type().to_owned(),
        platform: action.platform().to_owned(),
        target_resource_id: action.target_resource_id().to_owned(),
        performed_at: action.timestamp(),
        success: action.success(),
        detail: action.detail().map(str::to_owned),
    })
}

fn row_to_action(row: ActionRow) -> TaskRepositoryResult<Action> {
    let data = ActionData {
        task_id: TaskId::from_uuid(row.task_id),
        attempt: to_attempt_number(row.attempt_number)?,
        action_type: row.action_type,
        platform: row.platform,
        target_resource_id: row.target_resource_id,
        timestamp: row.performed_at,
        success: row.success,
        detail: row.detail,
    };
    Ok(Action::from_persisted(row.id, data))
}
