//! Diesel schema for task persistence.

diesel::table! {
    /// Task records with origin metadata and lifecycle state.
    tasks (id) {
        /// Internal task identifier.
        id -> Uuid,
        /// Origin payload including source, event type and dedupe key.
        origin -> Jsonb,
        /// Task type tag.
        #[max_length = 64]
        task_type -> Varchar,
        /// Priority band, lower is more urgent.
        priority -> Int2,
        /// Opaque context payload.
        context -> Jsonb,
        /// Optional `owner/repo` reference.
        #[max_length = 255]
        repository -> Nullable<Varchar>,
        /// Task lifecycle state.
        #[max_length = 50]
        state -> Varchar,
        /// Charged failure count.
        retry_count -> Int4,
        /// Retry budget.
        max_retries -> Int4,
        /// Attempts started so far.
        attempts_started -> Int4,
        /// Cause of the latest failure or dead letter.
        last_failure -> Nullable<Text>,
        /// Time the task last entered the queue.
        queued_at -> Timestamptz,
        /// Creation timestamp.
        created_at -> Timestamptz,
        /// Last update timestamp.
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    /// Execution attempts keyed by task and attempt number.
    attempts (task_id, attempt_number) {
        /// Owning task identifier.
        task_id -> Uuid,
        /// One-based attempt number.
        attempt_number -> Int4,
        /// Attempt status.
        #[max_length = 50]
        status -> Varchar,
        /// Start timestamp.
        started_at -> Timestamptz,
        /// Last output activity timestamp.
        last_activity_at -> Timestamptz,
        /// Terminal timestamp.
        finished_at -> Nullable<Timestamptz>,
        /// Failure cause payload.
        failure -> Nullable<Jsonb>,
        /// Worker exit code.
        exit_code -> Nullable<Int4>,
        /// Analysis summary from the validated result.
        analysis_summary -> Nullable<Text>,
        /// Declared result success flag.
        declared_success -> Nullable<Bool>,
        /// Captured log path.
        log_path -> Text,
    }
}

diesel::table! {
    /// Append-only action audit rows.
    actions (id) {
        /// Action identifier.
        id -> Uuid,
        /// Insertion sequence.
        seq -> Int8,
        /// Owning task identifier.
        task_id -> Uuid,
        /// Attempt that declared the action.
        attempt_number -> Int4,
        /// Operation performed.
        #[max_length = 128]
        action_type -> Varchar,
        /// Targeted platform.
        #[max_length = 128]
        platform -> Varchar,
        /// Targeted resource.
        #[max_length = 255]
        target_resource_id -> Varchar,
        /// Reported action time.
        performed_at -> Timestamptz,
        /// Reported success flag.
        success -> Bool,
        /// Optional detail.
        detail -> Nullable<Text>,
    }
}
