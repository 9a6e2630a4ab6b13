//! Inbound events, their stored form and deduplication keys.

use crate::task::domain::{ResourceId, SourceTag, TaskId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

/// Normalized event delivered by the ingress layer.
///
/// Authenticity has already been verified upstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundEvent {
    /// External system tag, for example `tracker` or `chat`.
    pub source: String,
    /// Source-specific event type, for example `issue.created`.
    #[serde(rename = "type")]
    pub event_type: String,
    /// Resource the event concerns.
    pub resource_id: String,
    /// Raw event payload.
    pub payload: Value,
    /// Time the ingress layer received the event.
    pub received_at: DateTime<Utc>,
}

impl InboundEvent {
    /// Creates an event with an empty object payload.
    #[must_use]
    pub fn new(
        source: impl Into<String>,
        event_type: impl Into<String>,
        resource_id: impl Into<String>,
        received_at: DateTime<Utc>,
    ) -> Self {
        Self {
            source: source.into(),
            event_type: event_type.into(),
            resource_id: resource_id.into(),
            payload: Value::Object(serde_json::Map::new()),
            received_at,
        }
    }

    /// Sets the event payload.
    #[must_use]
    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }
}

/// Identifier of a durably stored event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(Uuid);

impl EventId {
    /// Creates a new random event identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates an event identifier from an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the wrapped UUID.
    #[must_use]
    pub const fn into_inner(self) -> Uuid {
        self.0
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Raw event as appended to the audit log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredEvent {
    /// Log identifier.
    pub id: EventId,
    /// The event exactly as delivered.
    pub event: InboundEvent,
    /// Time the event was appended.
    pub stored_at: DateTime<Utc>,
}

/// Idempotency key: digest of source, type, resource and time bucket.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DedupeKey(String);

impl DedupeKey {
    /// Computes the key for an event.
    ///
    /// The bucket is `floor(received_at / window)` in milliseconds, so
    /// redeliveries inside one window share a key.
    #[must_use]
    pub fn compute(
        source: &SourceTag,
        event_type: &str,
        resource_id: &ResourceId,
        received_at: DateTime<Utc>,
        window: Duration,
    ) -> Self {
        let window_ms = i64::try_from(window.as_millis()).unwrap_or(i64::MAX).max(1);
        let bucket = received_at.timestamp_millis().div_euclid(window_ms);

        let mut hasher = Sha256::new();
        for part in [
            source.as_str(),
            event_type.trim(),
            resource_id.as_str(),
            &bucket.to_string(),
        ] {
            hasher.update(part.as_bytes());
            hasher.update([0x1f]);
        }
        Self(format!("{:x}", hasher.finalize()))
    }

    /// Wraps a previously computed key.
    #[must_use]
    pub fn from_raw(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the key as `str`.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DedupeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Record that an event's dedupe key produced a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DedupeClaim {
    /// Claimed key.
    pub key: DedupeKey,
    /// Source of the claiming event.
    pub source: SourceTag,
    /// Resource of the claiming event.
    pub resource_id: ResourceId,
    /// Task created for the event.
    pub task_id: TaskId,
    /// Arrival time of the claiming event.
    pub received_at: DateTime<Utc>,
}
