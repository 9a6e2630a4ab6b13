//! Concurrency admission: a bounded pool of slots handed out in priority
//! order.
//!
//! [`AdmissionQueue`] holds the ordering rules. [`AdmissionController`] is a
//! handle to an actor task that owns the queue and the slot count; callers
//! talk to it over channels and read counts from a `watch` channel.

mod controller;
mod queue;

pub use controller::{AdmissionController, AdmissionError, AdmissionStatus, Lease};
pub use queue::{AdmissionQueue, Ticket};

#[cfg(test)]
mod tests;
