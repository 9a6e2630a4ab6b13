//! Behaviour tests for the event-to-outcome task pipeline.

mod task_pipeline_steps;
mod test_helpers;

use rstest_bdd_macros::scenario;
use task_pipeline_steps::world::{PipelineWorld, world};

#[scenario(
    path = "tests/features/task_pipeline.feature",
    name = "Duplicate events collapse into one task"
)]
#[tokio::test(flavor = "multi_thread")]
async fn duplicate_events_collapse(world: PipelineWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/task_pipeline.feature",
    name = "Idle worker is timed out and retried"
)]
#[tokio::test(flavor = "multi_thread")]
async fn idle_worker_is_retried(world: PipelineWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/task_pipeline.feature",
    name = "Invalid declared actions are dropped"
)]
#[tokio::test(flavor = "multi_thread")]
async fn invalid_actions_are_dropped(world: PipelineWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/task_pipeline.feature",
    name = "Repeated validation errors dead-letter early"
)]
#[tokio::test(flavor = "multi_thread")]
async fn repeated_validation_errors_dead_letter(world: PipelineWorld) {
    let _ = world;
}
