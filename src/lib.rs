//! Foreman: event-driven orchestration of sandboxed worker processes.
//!
//! Inbound platform events are normalized and deduplicated into tasks, queued
//! under a global concurrency limit, and executed as child processes inside
//! per-attempt workspaces. Worker output is validated against a structured
//! result contract and failures are retried with bounded, jittered backoff
//! until the task completes or is dead-lettered.
//!
//! # Architecture
//!
//! Foreman follows hexagonal architecture principles:
//!
//! - **Domain**: Pure business logic with no infrastructure dependencies
//! - **Ports**: Abstract trait interfaces for persistence
//! - **Adapters**: In-memory and `PostgreSQL` implementations of the ports
//!
//! # Modules
//!
//! - [`dispatch`]: Event normalization, deduplication, routing and replay
//! - [`task`]: Task records, attempts, actions and their state machine
//! - [`admission`]: Priority queue behind a global concurrency limit
//! - [`workspace`]: Per-attempt sandbox directories and prompt rendering
//! - [`supervisor`]: Worker process lifecycle with idle and hard timeouts
//! - [`output`]: Worker result contract validation
//! - [`retry`]: Failure classification and backoff
//! - [`orchestrator`]: The run loop tying the pieces together
//! - [`config`]: Typed configuration with validation
//! - [`telemetry`]: Structured logging setup

pub mod admission;
pub mod config;
pub mod dispatch;
pub mod orchestrator;
pub mod output;
pub mod retry;
pub mod supervisor;
pub mod task;
pub mod telemetry;
pub mod worker;
pub mod workspace;

#[cfg(test)]
mod test_support;
