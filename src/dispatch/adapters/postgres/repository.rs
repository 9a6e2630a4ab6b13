//! `PostgreSQL` event store implementation.

use super::{
    models::{ClaimRow, EventRow},
    schema::{dedupe_claims, inbound_events},
};
use crate::dispatch::{
    domain::{DedupeClaim, DedupeKey, EventId, InboundEvent, StoredEvent},
    ports::{EventStore, EventStoreError, EventStoreResult},
};
use crate::task::{
    adapters::postgres::TaskPgPool,
    domain::{ResourceId, SourceTag, TaskId},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use mockable::{Clock, DefaultClock};
use std::sync::Arc;

/// `PostgreSQL`-backed event store sharing the task connection pool.
#[derive(Clone)]
pub struct PostgresEventStore {
    pool: TaskPgPool,
    clock: Arc<dyn Clock + Send + Sync>,
}

impl std::fmt::Debug for PostgresEventStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresEventStore")
            .field("pool", &self.pool)
            .finish_non_exhaustive()
    }
}

impl PostgresEventStore {
    /// Creates a store from a `PostgreSQL` connection pool.
    #[must_use]
    pub fn new(pool: TaskPgPool) -> Self {
        Self {
            pool,
            clock: Arc::new(DefaultClock),
        }
    }

    /// Replaces the clock used to stamp appended events.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        self.clock = clock;
        self
    }

    async fn run_blocking<F, T>(&self, f: F) -> EventStoreResult<T>
    where
        F: FnOnce(&mut PgConnection) -> EventStoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut connection = pool.get().map_err(EventStoreError::persistence)?;
            f(&mut connection)
        })
        .await
        .map_err(EventStoreError::persistence)?
    }
}

#[async_trait]
impl EventStore for PostgresEventStore {
    async fn append(&self, event: &InboundEvent) -> EventStoreResult<StoredEvent> {
        let stored = StoredEvent {
            id: EventId::new(),
            event: event.clone(),
            stored_at: self.clock.utc(),
        };
        let row = to_event_row(&stored);

        self.run_blocking(move |connection| {
            diesel::insert_into(inbound_events::table)
                .values(&row)
                .execute(connection)
                .map_err(EventStoreError::persistence)?;
            Ok(())
        })
        .await?;
        Ok(stored)
    }

    async fn claim(&self, claim: &DedupeClaim) -> EventStoreResult<bool> {
        let row = to_claim_row(claim);
        self.run_blocking(move |connection| {
            let inserted = diesel::insert_into(dedupe_claims::table)
                .values(&row)
                .on_conflict(dedupe_claims::dedupe_key)
                .do_nothing()
                .execute(connection)
                .map_err(EventStoreError::persistence)?;
            Ok(inserted == 1)
        })
        .await
    }

    async fn release(&self, key: &DedupeKey) -> EventStoreResult<()> {
        let key = key.as_str().to_owned();
        self.run_blocking(move |connection| {
            diesel::delete(dedupe_claims::table.filter(dedupe_claims::dedupe_key.eq(key)))
                .execute(connection)
                .map_err(EventStoreError::persistence)?;
            Ok(())
        })
        .await
    }

    async fn latest_claim(
        &self,
        source: &SourceTag,
        resource_id: &ResourceId,
    ) -> EventStoreResult<Option<DedupeClaim>> {
        let source = source.as_str().to_owned();
        let resource_id = resource_id.as_str().to_owned();
        self.run_blocking(move |connection| {
            let row = dedupe_claims::table
                .filter(dedupe_claims::source.eq(source))
                .filter(dedupe_claims::resource_id.eq(resource_id))
                .order(dedupe_claims::received_at.desc())
                .select(ClaimRow::as_select())
                .first::<ClaimRow>(connection)
                .optional()
                .map_err(EventStoreError::persistence)?;
            row.map(row_to_claim).transpose()
        })
        .await
    }

    async fn events_since(&self, since: DateTime<Utc>) -> EventStoreResult<Vec<StoredEvent>> {
        self.run_blocking(move |connection| {
            let rows = inbound_events::table
                .filter(inbound_events::received_at.ge(since))
                .order((inbound_events::received_at.asc(), inbound_events::stored_at.asc()))
                .select(EventRow::as_select())
                .load::<EventRow>(connection)
                .map_err(EventStoreError::persistence)?;
            Ok(rows.into_iter().map(row_to_event).collect())
        })
        .await
    }
}

pub(super) fn to_event_row(stored: &StoredEvent) -> EventRow {
    EventRow {
        id: stored.id.into_inner(),
        source: stored.event.source.clone(),
        event_type: stored.event.event_type.clone(),
        resource_id: stored.event.resource_id.clone(),
        payload: stored.event.payload.clone(),
        received_at: stored.event.received_at,
        stored_at: stored.stored_at,
    }
}

pub(super) fn row_to_event(row: EventRow) -> StoredEvent {
    StoredEvent {
        id: EventId::from_uuid(row.id),
        event: InboundEvent {
            source: row.source,
            event_type: row.event_type,
            resource_id: row.resource_id,
            payload: row.payload,
            received_at: row.received_at,
        },
        stored_at: row.stored_at,
    }
}

pub(super) fn to_claim_row(claim: &DedupeClaim) -> ClaimRow {
    ClaimRow {
        dedupe_key: claim.key.as_str().to_owned(),
        source: claim.source.as_str().to_owned(),
        resource_id: claim.resource_id.as_str().to_owned(),
        task_id: claim.task_id.into_inner(),
        received_at: claim.received_at,
    }
}

pub(super) fn row_to_claim(row: ClaimRow) -> EventStoreResult<DedupeClaim> {
    Ok(DedupeClaim {
        key: DedupeKey::from_raw(row.dedupe_key),
        source: SourceTag::new(row.source).map_err(EventStoreError::persistence)?,
        resource_id: ResourceId::new(row.resource_id).map_err(EventStoreError::persistence)?,
        task_id: TaskId::from_uuid(row.task_id),
        received_at: row.received_at,
    })
}
