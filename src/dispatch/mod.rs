//! Event intake: durable logging, routing, deduplication and task creation.
//!
//! Every inbound event is appended to the event log before anything else.
//! Routable events that are not duplicates become queued tasks.

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod services;

#[cfg(test)]
mod tests;
