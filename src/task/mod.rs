//! Task records and their lifecycle.
//!
//! A task is the unit of orchestrated work derived from one inbound event.
//! Its lifecycle is an explicit state machine: illegal transitions such as
//! `dead_lettered -> queued` are rejected at construction time rather than
//! guarded by ad hoc flags. The module follows hexagonal architecture:
//!
//! - Domain types in [`domain`]
//! - Port contracts in [`ports`]
//! - Adapter implementations in [`adapters`]

pub mod adapters;
pub mod domain;
pub mod ports;

#[cfg(test)]
mod tests;
