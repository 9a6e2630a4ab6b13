//! Then steps for task pipeline BDD scenarios.

use super::world::{PipelineWorld, run_async};
use crate::test_helpers::ensure_serial_attempts;
use foreman::task::domain::{AttemptNumber, AttemptStatus, TaskState};
use foreman::task::ports::TaskRepository;
use rstest_bdd_macros::then;

#[then("{count:usize} task is created")]
fn tasks_created(world: &PipelineWorld, count: usize) -> Result<(), eyre::Report> {
    eyre::ensure!(
        world.created.len() == count,
        "expected {count} created tasks, found {}",
        world.created.len()
    );
    Ok(())
}

#[then("the queue holds {count:usize} task")]
fn queue_holds(world: &mut PipelineWorld, count: usize) -> Result<(), eyre::Report> {
    let queued = world.orchestrator()?.status().admission.queued;
    eyre::ensure!(queued == count, "expected {count} queued tasks, found {queued}");
    Ok(())
}

#[then(r#"attempt {number:u32} ended as "{status}""#)]
fn attempt_ended_as(
    world: &mut PipelineWorld,
    number: u32,
    status: String,
) -> Result<(), eyre::Report> {
    let expected = AttemptStatus::try_from(status.as_str())
        .map_err(|err| eyre::eyre!("invalid expected status in scenario: {err}"))?;
    let attempt_number = AttemptNumber::new(number)?;
    let task_id = world.created_task()?;
    let attempt = run_async(world.orchestrator()?.tasks().find_attempt(task_id, attempt_number))?
        .ok_or_else(|| eyre::eyre!("attempt {attempt_number} was not recorded"))?;
    eyre::ensure!(
        attempt.status == expected,
        "expected attempt {attempt_number} to be {expected}, found {}",
        attempt.status
    );
    Ok(())
}

#[then("the workspace of attempt {number:u32} is archived")]
fn workspace_archived(world: &mut PipelineWorld, number: u32) -> Result<(), eyre::Report> {
    let attempt_number = AttemptNumber::new(number)?;
    let task_id = world.created_task()?;
    let archive = world
        .orchestrator()?
        .workspaces()
        .archive_path(task_id, attempt_number);
    eyre::ensure!(archive.is_dir(), "no archive at {archive}");
    Ok(())
}

#[then("the task has been charged at least {count:u32} retry")]
fn charged_at_least(world: &mut PipelineWorld, count: u32) -> Result<(), eyre::Report> {
    let task = world.settle(|_| true)?;
    eyre::ensure!(
        task.retry_count() >= count,
        "expected at least {count} charged retries, found {}",
        task.retry_count()
    );
    Ok(())
}

#[then(r#"the task state is "{state}""#)]
fn task_state_is(world: &mut PipelineWorld, state: String) -> Result<(), eyre::Report> {
    let expected = TaskState::try_from(state.as_str())
        .map_err(|err| eyre::eyre!("invalid expected state in scenario: {err}"))?;
    let task = world.settle(|_| true)?;
    eyre::ensure!(
        task.state() == expected,
        "expected state {expected}, found {}",
        task.state()
    );
    Ok(())
}

#[then("{count:usize} action is recorded")]
fn actions_recorded(world: &mut PipelineWorld, count: usize) -> Result<(), eyre::Report> {
    let task_id = world.created_task()?;
    let actions = run_async(world.orchestrator()?.tasks().actions_for(task_id))?;
    eyre::ensure!(
        actions.len() == count,
        "expected {count} actions, found {}",
        actions.len()
    );
    Ok(())
}

#[then("the task has {count:u32} attempts")]
fn task_has_attempts(world: &mut PipelineWorld, count: u32) -> Result<(), eyre::Report> {
    let task = world.settle(|_| true)?;
    eyre::ensure!(
        task.attempts_started() == count,
        "expected {count} attempts, found {}",
        task.attempts_started()
    );
    Ok(())
}

#[then(r#"the failure mentions "{fragment}""#)]
fn failure_mentions(world: &mut PipelineWorld, fragment: String) -> Result<(), eyre::Report> {
    let task = world.settle(|_| true)?;
    let failure = task
        .last_failure()
        .ok_or_else(|| eyre::eyre!("task has no recorded failure"))?;
    eyre::ensure!(
        failure.contains(fragment.as_str()),
        "failure {failure:?} does not mention {fragment:?}"
    );
    Ok(())
}

#[then("every attempt ran alone in its own workspace")]
fn attempts_ran_serially(world: &mut PipelineWorld) -> Result<(), eyre::Report> {
    let task_id = world.created_task()?;
    run_async(ensure_serial_attempts(world.orchestrator()?, task_id))
}
