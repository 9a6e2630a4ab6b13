//! Worker process supervision.
//!
//! One [`ProcessSupervisor::run`] call drives one attempt: it spawns the
//! worker inside its sandbox, streams both output pipes into `worker.log`,
//! enforces the idle and hard timeouts, honours cancellation and finally
//! validates the result artifact when the worker exits cleanly.

mod error;
mod outcome;
mod process;

pub use error::SupervisorError;
pub use outcome::{AttemptOutcome, FailureDetail, RunReport, TimeoutKind};
pub use process::{ProcessSupervisor, Timeouts};
