//! In-memory adapters for event intake.

mod event_store;

pub use event_store::InMemoryEventStore;
