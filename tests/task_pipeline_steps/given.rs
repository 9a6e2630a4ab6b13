//! Given steps for task pipeline BDD scenarios.

use super::world::PipelineWorld;
use crate::test_helpers::{Site, VALID_RESULT, result_script};
use rstest_bdd_macros::given;

const MIXED_ACTIONS: &str = r#"{"success": true, "analysis_summary": "partly triaged", "actions": [{"type": "label_added", "platform": "tracker", "target_resource_id": "X-3"}, {"type": "comment_added", "platform": "tracker"}]}"#;

#[given("a foreman whose worker reports a valid result")]
fn worker_reports_valid_result(world: &mut PipelineWorld) -> Result<(), eyre::Report> {
    world.site = Some(Site::with_worker(&result_script(VALID_RESULT))?);
    Ok(())
}

#[given("a foreman whose worker hangs without output")]
fn worker_hangs(world: &mut PipelineWorld) -> Result<(), eyre::Report> {
    world.site = Some(Site::with_worker("sleep 30\n")?);
    Ok(())
}

#[given("a foreman whose worker declares one valid and one invalid action")]
fn worker_declares_mixed_actions(world: &mut PipelineWorld) -> Result<(), eyre::Report> {
    world.site = Some(Site::with_worker(&result_script(MIXED_ACTIONS))?);
    Ok(())
}

#[given("a foreman whose worker writes malformed output")]
fn worker_writes_malformed_output(world: &mut PipelineWorld) -> Result<(), eyre::Report> {
    world.site = Some(Site::with_worker(&result_script("not json"))?);
    Ok(())
}

#[given("the idle timeout is {millis:u64} milliseconds")]
fn idle_timeout_is(world: &mut PipelineWorld, millis: u64) -> Result<(), eyre::Report> {
    world.site_mut()?.config.supervisor.idle_timeout_ms = millis;
    Ok(())
}

#[given("the retry budget is {budget:u32}")]
fn retry_budget_is(world: &mut PipelineWorld, budget: u32) -> Result<(), eyre::Report> {
    world.site_mut()?.config.retry.default_max_retries = budget;
    Ok(())
}
