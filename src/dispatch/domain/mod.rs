//! Domain model for event intake: events, dedupe keys, routes and priority
//! policies.

mod event;
mod priority;
mod routing;

pub use event::{DedupeClaim, DedupeKey, EventId, InboundEvent, StoredEvent};
pub use priority::{FixedPriority, KeywordPriority, KeywordRule, PriorityPolicy};
pub use routing::{Route, RoutingTable, WILDCARD_EVENT_TYPE};
