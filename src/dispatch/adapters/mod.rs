//! Adapter implementations for event intake ports.

pub mod memory;
pub mod postgres;
