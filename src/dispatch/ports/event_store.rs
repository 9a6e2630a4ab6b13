//! Event store port: durable raw event log and dedupe-key claims.

use crate::dispatch::domain::{DedupeClaim, DedupeKey, InboundEvent, StoredEvent};
use crate::task::domain::{ResourceId, SourceTag};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;

/// Result type for event store operations.
pub type EventStoreResult<T> = Result<T, EventStoreError>;

/// Durable event log and idempotency claims.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Appends a raw event to the log and returns its stored form.
    async fn append(&self, event: &InboundEvent) -> EventStoreResult<StoredEvent>;

    /// Inserts a dedupe claim if its key is absent.
    ///
    /// Returns `false` when the key was already claimed.
    async fn claim(&self, claim: &DedupeClaim) -> EventStoreResult<bool>;

    /// Removes a claim whose task could not be stored.
    async fn release(&self, key: &DedupeKey) -> EventStoreResult<()>;

    /// Returns the most recent claim for a `(source, resource)` pair, by
    /// event arrival time.
    async fn latest_claim(
        &self,
        source: &SourceTag,
        resource_id: &ResourceId,
    ) -> EventStoreResult<Option<DedupeClaim>>;

    /// Returns events received at or after `since`, oldest first.
    async fn events_since(&self, since: DateTime<Utc>) -> EventStoreResult<Vec<StoredEvent>>;
}

/// Errors returned by event store implementations.
#[derive(Debug, Clone, Error)]
pub enum EventStoreError {
    /// Persistence-layer failure.
    #[error("event store error: {0}")]
    Persistence(Arc<dyn std::error::Error + Send + Sync>),
}

impl EventStoreError {
    /// Wraps a persistence error.
    pub fn persistence(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Persistence(Arc::new(err))
    }
}
