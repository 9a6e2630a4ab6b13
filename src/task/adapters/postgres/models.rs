//! Diesel row models for task persistence.

use super::schema::{actions, attempts, tasks};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde_json::Value;

/// Query result and insert row for task records.
#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = tasks)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct TaskRow {
    /// Internal task identifier.
    pub id: uuid::Uuid,
    /// Origin JSON payload.
    pub origin: Value,
    /// Task type tag.
    pub task_type: String,
    /// Priority band.
    pub priority: i16,
    /// Context JSON payload.
    pub context: Value,
    /// Optional repository reference.
    pub repository: Option<String>,
    /// Lifecycle state.
    pub state: String,
    /// Charged failure count.
    pub retry_count: i32,
    /// Retry budget.
    pub max_retries: i32,
    /// Attempts started so far.
    pub attempts_started: i32,
    /// Cause of the latest failure.
    pub last_failure: Option<String>,
    /// Time the task last entered the queue.
    pub queued_at: DateTime<Utc>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// Query result and insert row for attempts.
#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = attempts)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct AttemptRow {
    /// Owning task identifier.
    pub task_id: uuid::Uuid,
    /// One-based attempt number.
    pub attempt_number: i32,
    /// Attempt status.
    pub status: String,
    /// Start timestamp.
    pub started_at: DateTime<Utc>,
    /// Last output activity timestamp.
    pub last_activity_at: DateTime<Utc>,
    /// Terminal timestamp.
    pub finished_at: Option<DateTime<Utc>>,
    /// Failure cause payload.
    pub failure: Option<Value>,
    /// Worker exit code.
    pub exit_code: Option<i32>,
    /// Analysis summary.
    pub analysis_summary: Option<String>,
    /// Declared success flag.
    pub declared_success: Option<bool>,
    /// Captured log path.
    pub log_path: String,
}

/// Query result row for actions.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = actions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ActionRow {
    /// Action identifier.
    pub id: uuid::Uuid,
    /// Insertion sequence.
    pub seq: i64,
    /// Owning task identifier.
    pub task_id: uuid::Uuid,
    /// Attempt that declared the action.
    pub attempt_number: i32,
    /// Operation performed.
    pub action_type: String,
    /// Targeted platform.
    pub platform: String,
    /// Targeted resource.
    pub target_resource_id: String,
    /// Reported action time.
    pub performed_at: DateTime<Utc>,
    /// Reported success flag.
    pub success: bool,
    /// Optional detail.
    pub detail: Option<String>,
}

/// Insert model for actions; the sequence is assigned by the database.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = actions)]
pub struct NewActionRow {
    /// Action identifier.
    pub id: uuid::Uuid,
    /// Owning task identifier.
    pub task_id: uuid::Uuid,
    /// Attempt that declared the action.
    pub attempt_number: i32,
    /// Operation performed.
    pub action_type: String,
    /// Targeted platform.
    pub platform: String,
    /// Targeted resource.
    pub target_resource_id: String,
    /// Reported action time.
    pub performed_at: DateTime<Utc>,
    /// Reported success flag.
    pub success: bool,
    /// Optional detail.
    pub detail: Option<String>,
}
