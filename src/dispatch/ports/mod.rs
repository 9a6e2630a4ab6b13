//! Port contracts for event intake.

pub mod event_store;

pub use event_store::{EventStore, EventStoreError, EventStoreResult};
