//! `PostgreSQL` adapters for task persistence.

mod models;
mod repository;
mod schema;

#[cfg(test)]
mod tests;

pub use repository::{PostgresTaskRepository, TaskPgPool};
