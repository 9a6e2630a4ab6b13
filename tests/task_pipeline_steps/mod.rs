//! Step definitions for task pipeline scenarios.

pub mod given;
pub mod then;
pub mod when;
pub mod world;
