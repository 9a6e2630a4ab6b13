//! `PostgreSQL` adapters for the event log and dedupe claims.

mod models;
mod repository;
mod schema;

#[cfg(test)]
mod tests;

pub use repository::PostgresEventStore;
