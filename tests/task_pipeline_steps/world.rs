//! Shared world state for task pipeline BDD scenarios.

use crate::test_helpers::{Site, TestOrchestrator, spawn_runner, wait_for};
use foreman::orchestrator::OrchestratorResult;
use foreman::task::domain::{Task, TaskId};
use rstest::fixture;
use tokio::task::JoinHandle;

/// Scenario world for pipeline behaviour tests.
#[derive(Default)]
pub struct PipelineWorld {
    pub site: Option<Site>,
    pub orchestrator: Option<TestOrchestrator>,
    pub runner: Option<JoinHandle<OrchestratorResult<()>>>,
    pub created: Vec<TaskId>,
}

impl PipelineWorld {
    /// Returns the site laid out by a given step.
    pub fn site_mut(&mut self) -> Result<&mut Site, eyre::Report> {
        self.site
            .as_mut()
            .ok_or_else(|| eyre::eyre!("missing worker site in scenario world"))
    }

    /// Returns the orchestrator, building it from the site on first use.
    pub fn orchestrator(&mut self) -> Result<&TestOrchestrator, eyre::Report> {
        if self.orchestrator.is_none() {
            let built = self
                .site
                .as_ref()
                .ok_or_else(|| eyre::eyre!("missing worker site in scenario world"))?
                .orchestrator()?;
            self.orchestrator = Some(built);
        }
        self.orchestrator
            .as_ref()
            .ok_or_else(|| eyre::eyre!("orchestrator was not built"))
    }

    /// Starts the run loop unless it is already running.
    pub fn start(&mut self) -> Result<(), eyre::Report> {
        if self.runner.is_none() {
            let runner = spawn_runner(self.orchestrator()?);
            self.runner = Some(runner);
        }
        Ok(())
    }

    /// Returns the single task created by the scenario.
    pub fn created_task(&self) -> Result<TaskId, eyre::Report> {
        match self.created.as_slice() {
            [task_id] => Ok(*task_id),
            other => Err(eyre::eyre!("expected one created task, found {}", other.len())),
        }
    }

    /// Blocks until the created task satisfies `done`.
    pub fn settle(&mut self, done: impl Fn(&Task) -> bool) -> Result<Task, eyre::Report> {
        let task_id = self.created_task()?;
        let orchestrator = self.orchestrator()?;
        run_async(wait_for(orchestrator, task_id, done))
    }
}

impl Drop for PipelineWorld {
    fn drop(&mut self) {
        if let Some(orchestrator) = &self.orchestrator {
            orchestrator.shutdown();
        }
    }
}

/// Fixture that creates a new scenario world.
#[fixture]
pub fn world() -> PipelineWorld {
    PipelineWorld::default()
}

/// Runs an async operation within sync step definitions.
pub fn run_async<T>(future: impl std::future::Future<Output = T>) -> T {
    tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(future))
}
