//! Unit tests for the task lifecycle state machine.

use super::queued_task;
use crate::task::domain::{AttemptNumber, Task, TaskDomainError, TaskState};
use eyre::{bail, ensure};
use mockable::DefaultClock;
use rstest::{fixture, rstest};

#[fixture]
fn clock() -> DefaultClock {
    DefaultClock
}

#[rstest]
#[case(TaskState::Queued, TaskState::Admitted, true)]
#[case(TaskState::Queued, TaskState::AttemptRunning, false)]
#[case(TaskState::Queued, TaskState::DeadLettered, true)]
#[case(TaskState::Queued, TaskState::Completed, false)]
#[case(TaskState::Admitted, TaskState::AttemptRunning, true)]
#[case(TaskState::Admitted, TaskState::Queued, true)]
#[case(TaskState::Admitted, TaskState::Completed, false)]
#[case(TaskState::AttemptRunning, TaskState::AttemptSucceeded, true)]
#[case(TaskState::AttemptRunning, TaskState::AttemptFailed, true)]
#[case(TaskState::AttemptRunning, TaskState::AttemptTimedOut, true)]
#[case(TaskState::AttemptRunning, TaskState::DeadLettered, true)]
#[case(TaskState::AttemptRunning, TaskState::Completed, false)]
#[case(TaskState::AttemptSucceeded, TaskState::Completed, true)]
#[case(TaskState::AttemptSucceeded, TaskState::Queued, false)]
#[case(TaskState::AttemptFailed, TaskState::Queued, true)]
#[case(TaskState::AttemptFailed, TaskState::DeadLettered, true)]
#[case(TaskState::AttemptFailed, TaskState::Completed, false)]
#[case(TaskState::AttemptTimedOut, TaskState::Queued, true)]
#[case(TaskState::AttemptTimedOut, TaskState::DeadLettered, true)]
#[case(TaskState::Completed, TaskState::Archived, true)]
#[case(TaskState::Completed, TaskState::Queued, false)]
#[case(TaskState::DeadLettered, TaskState::Queued, false)]
#[case(TaskState::DeadLettered, TaskState::Archived, true)]
#[case(TaskState::Archived, TaskState::Queued, false)]
fn can_transition_to_returns_expected(
    #[case] from: TaskState,
    #[case] to: TaskState,
    #[case] expected: bool,
) {
    assert_eq!(from.can_transition_to(to), expected);
}

#[rstest]
fn no_state_transitions_to_itself() {
    for state in TaskState::ALL {
        assert!(!state.can_transition_to(state), "{state} -> {state}");
    }
}

#[rstest]
#[case(TaskState::Queued, false)]
#[case(TaskState::AttemptRunning, false)]
#[case(TaskState::AttemptFailed, false)]
#[case(TaskState::Completed, true)]
#[case(TaskState::DeadLettered, true)]
#[case(TaskState::Archived, true)]
fn is_terminal_returns_expected(#[case] state: TaskState, #[case] expected: bool) {
    assert_eq!(state.is_terminal(), expected);
}

#[rstest]
fn begin_attempt_numbers_attempts_from_one(
    clock: DefaultClock,
    queued_task: Task,
) -> eyre::Result<()> {
    let mut task = queued_task;
    task.admit(&clock)?;
    let first = task.begin_attempt(&clock)?;
    ensure!(first == AttemptNumber::first());

    task.transition_to(TaskState::AttemptFailed, &clock)?;
    task.requeue(clock_now(&clock), &clock)?;
    task.admit(&clock)?;
    let second = task.begin_attempt(&clock)?;

    ensure!(second == first.next());
    ensure!(task.attempts_started() == 2);
    Ok(())
}

#[rstest]
fn begin_attempt_requires_admission(clock: DefaultClock, queued_task: Task) -> eyre::Result<()> {
    let mut task = queued_task;
    let task_id = task.id();

    let result = task.begin_attempt(&clock);

    let expected = Err(TaskDomainError::InvalidStateTransition {
        task_id,
        from: TaskState::Queued,
        to: TaskState::AttemptRunning,
    });
    if result != expected {
        bail!("expected {expected:?}, got {result:?}");
    }
    ensure!(task.attempts_started() == 0);
    Ok(())
}

#[rstest]
fn dead_lettered_task_cannot_be_requeued(
    clock: DefaultClock,
    queued_task: Task,
) -> eyre::Result<()> {
    let mut task = queued_task;
    task.dead_letter("cancelled", &clock)?;

    let result = task.requeue(clock_now(&clock), &clock);

    ensure!(matches!(
        result,
        Err(TaskDomainError::InvalidStateTransition {
            from: TaskState::DeadLettered,
            to: TaskState::Queued,
            ..
        })
    ));
    ensure!(task.state() == TaskState::DeadLettered);
    ensure!(task.last_failure() == Some("cancelled"));
    Ok(())
}

#[rstest]
fn charged_failures_accumulate_until_budget_is_exceeded(
    clock: DefaultClock,
    queued_task: Task,
) -> eyre::Result<()> {
    let mut task = queued_task;
    ensure!(task.max_retries() == 3);

    for expected in 1..=3 {
        task.charge_failure("worker exited with code 1", &clock);
        ensure!(task.retry_count() == expected);
        ensure!(!task.retry_budget_exhausted());
    }
    task.charge_failure("worker exited with code 1", &clock);

    ensure!(task.retry_count() == 4);
    ensure!(task.retry_budget_exhausted());
    Ok(())
}

fn clock_now(clock: &DefaultClock) -> chrono::DateTime<chrono::Utc> {
    mockable::Clock::utc(clock)
}
