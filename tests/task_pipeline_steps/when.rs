//! When steps for task pipeline BDD scenarios.

use super::world::{PipelineWorld, run_async};
use chrono::Utc;
use eyre::WrapErr;
use foreman::dispatch::domain::InboundEvent;
use rstest_bdd_macros::when;
use serde_json::json;

#[when(r#"the event "{event_type}" for "{resource}" is submitted {count:usize} times"#)]
fn submit_event(
    world: &mut PipelineWorld,
    event_type: String,
    resource: String,
    count: usize,
) -> Result<(), eyre::Report> {
    let orchestrator = world.orchestrator()?.clone();
    for _ in 0..count {
        let event = InboundEvent::new("tracker", event_type.as_str(), resource.as_str(), Utc::now())
            .with_payload(json!({"title": "Crash on start", "repository": "acme/widgets"}));
        let created = run_async(orchestrator.submit(&event)).wrap_err("submit event")?;
        world.created.extend(created);
    }
    Ok(())
}

#[when("the foreman runs until attempt {number:u32} starts")]
fn run_until_attempt(world: &mut PipelineWorld, number: u32) -> Result<(), eyre::Report> {
    world.start()?;
    world.settle(|task| task.attempts_started() >= number)?;
    Ok(())
}

#[when("the foreman runs until the task finishes")]
fn run_until_finished(world: &mut PipelineWorld) -> Result<(), eyre::Report> {
    world.start()?;
    world.settle(|task| task.state().is_terminal())?;
    Ok(())
}
