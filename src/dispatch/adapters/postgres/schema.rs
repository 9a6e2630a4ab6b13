//! Diesel schema for event intake persistence.

diesel::table! {
    /// Raw inbound events, append-only.
    inbound_events (id) {
        /// Log identifier.
        id -> Uuid,
        /// Source tag as delivered.
        #[max_length = 64]
        source -> Varchar,
        /// Event type as delivered.
        #[max_length = 128]
        event_type -> Varchar,
        /// Resource identifier as delivered.
        #[max_length = 255]
        resource_id -> Varchar,
        /// Raw payload.
        payload -> Jsonb,
        /// Ingress arrival time.
        received_at -> Timestamptz,
        /// Append time.
        stored_at -> Timestamptz,
    }
}

diesel::table! {
    /// Dedupe keys that produced a task.
    dedupe_claims (dedupe_key) {
        /// Hex digest key.
        #[max_length = 64]
        dedupe_key -> Varchar,
        /// Normalized source tag.
        #[max_length = 64]
        source -> Varchar,
        /// Normalized resource identifier.
        #[max_length = 255]
        resource_id -> Varchar,
        /// Task created for the claiming event.
        task_id -> Uuid,
        /// Arrival time of the claiming event.
        received_at -> Timestamptz,
    }
}
