//! Service layer for event intake.

mod dispatcher;

pub use dispatcher::{DispatchError, DispatchResult, DispatchSettings, Dispatcher, ReplayReport};
