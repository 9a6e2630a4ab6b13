//! Diesel row models for event intake persistence.

use super::schema::{dedupe_claims, inbound_events};
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde_json::Value;

/// Query result and insert row for inbound events.
#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = inbound_events)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct EventRow {
    /// Log identifier.
    pub id: uuid::Uuid,
    /// Source tag.
    pub source: String,
    /// Event type.
    pub event_type: String,
    /// Resource identifier.
    pub resource_id: String,
    /// Raw payload.
    pub payload: Value,
    /// Ingress arrival time.
    pub received_at: DateTime<Utc>,
    /// Append time.
    pub stored_at: DateTime<Utc>,
}

/// Query result and insert row for dedupe claims.
#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = dedupe_claims)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ClaimRow {
    /// Hex digest key.
    pub dedupe_key: String,
    /// Normalized source tag.
    pub source: String,
    /// Normalized resource identifier.
    pub resource_id: String,
    /// Claiming task.
    pub task_id: uuid::Uuid,
    /// Arrival time of the claiming event.
    pub received_at: DateTime<Utc>,
}
