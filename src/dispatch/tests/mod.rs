//! Unit tests for event intake.
