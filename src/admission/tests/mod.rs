//! Unit tests for admission ordering and the slot actor.

mod queue_tests;
