//! Validation of the worker's result artifact.
//!
//! The worker writes `output/result.json`. A missing file or a document that
//! does not have the expected shape is an [`OutputError`] with a stable
//! signature; a single malformed action is dropped and counted instead.

mod error;
mod result;
mod validator;

pub use error::OutputError;
pub use result::{DeclaredAction, WorkerResult};
pub use validator::OutputValidator;

#[cfg(test)]
mod tests;
