//! In-memory event log and dedupe claims.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockable::{Clock, DefaultClock};
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::dispatch::{
    domain::{DedupeClaim, DedupeKey, EventId, InboundEvent, StoredEvent},
    ports::{EventStore, EventStoreError, EventStoreResult},
};
use crate::task::domain::{ResourceId, SourceTag};

/// Thread-safe in-memory event store.
#[derive(Clone)]
pub struct InMemoryEventStore {
    state: Arc<RwLock<InMemoryEventState>>,
    clock: Arc<dyn Clock + Send + Sync>,
}

#[derive(Debug, Default)]
struct InMemoryEventState {
    events: Vec<StoredEvent>,
    claims: HashMap<DedupeKey, DedupeClaim>,
}

impl Default for InMemoryEventStore {
    fn default() -> Self {
        Self::with_clock(Arc::new(DefaultClock))
    }
}

impl std::fmt::Debug for InMemoryEventStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryEventStore")
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl InMemoryEventStore {
    /// Creates an empty store stamping events with the system clock.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty store stamping events with `clock`.
    #[must_use]
    pub fn with_clock(clock: Arc<dyn Clock + Send + Sync>) -> Self {
        Self {
            state: Arc::new(RwLock::new(InMemoryEventState::default())),
            clock,
        }
    }

    /// Returns the number of logged events.
    ///
    /// # Errors
    ///
    /// Returns [`EventStoreError::Persistence`] when the lock is poisoned.
    pub fn event_count(&self) -> EventStoreResult<usize> {
        Ok(self.read()?.events.len())
    }

    fn read(&self) -> EventStoreResult<RwLockReadGuard<'_, InMemoryEventState>> {
        self.state
            .read()
            .map_err(|err| EventStoreError::persistence(std::io::Error::other(err.to_string())))
    }

    fn write(&self) -> EventStoreResult<RwLockWriteGuard<'_, InMemoryEventState>> {
        self.state
            .write()
            .map_err(|err| EventStoreError::persistence(std::io::Error::other(err.to_string())))
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn append(&self, event: &InboundEvent) -> EventStoreResult<StoredEvent> {
        let stored = StoredEvent {
            id: EventId::new(),
            event: event.clone(),
            stored_at: self.clock.utc(),
        };
        self.write()?.events.push(stored.clone());
        Ok(stored)
    }

    async fn claim(&self, claim: &DedupeClaim) -> EventStoreResult<bool> {
        let mut state = self.write()?;
        if state.claims.contains_key(&claim.key) {
            return Ok(false);
        }
        state.claims.insert(claim.key.clone(), claim.clone());
        Ok(true)
    }

    async fn release(&self, key: &DedupeKey) -> EventStoreResult<()> {
        self.write()?.claims.remove(key);
        Ok(())
    }

    async fn latest_claim(
        &self,
        source: &SourceTag,
        resource_id: &ResourceId,
    ) -> EventStoreResult<Option<DedupeClaim>> {
        let state = self.read()?;
        Ok(state
            .claims
            .values()
            .filter(|claim| &claim.source == source && &claim.resource_id == resource_id)
            .max_by_key(|claim| claim.received_at)
            .cloned())
    }

    async fn events_since(&self, since: DateTime<Utc>) -> EventStoreResult<Vec<StoredEvent>> {
        let state = self.read()?;
        let mut events: Vec<StoredEvent> = state
            .events
            .iter()
            .filter(|stored| stored.event.received_at >= since)
            .cloned()
            .collect();
        events.sort_by_key(|stored| stored.event.received_at);
        Ok(events)
    }
}
