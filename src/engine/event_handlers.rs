// src/engine/event_handlers.rs

//! Event handling logic for the core runtime.

use tracing::debug;

use crate::dag::{ScheduledTask, Scheduler};
use crate::engine::{TaskName, TaskOutcome};

/// Command produced by the pure core, to be executed by the outer IO shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreCommand {
    /// Send these tasks to the executor.
    DispatchTasks(Vec<ScheduledTask>),
    /// Every task in the run reached a terminal state.
    RunFinished,
}

/// Decision returned by the core after handling a single event.
#[derive(Debug, Clone)]
pub struct CoreStep {
    pub commands: Vec<CoreCommand>,
    /// Whether the outer runtime loop should keep running.
    pub keep_running: bool,
}

/// Release the first ready tasks of a run.
pub fn handle_run_start(scheduler: &mut Scheduler) -> CoreStep {
    let step = scheduler.step_start();
    into_core_step(step.newly_scheduled, step.run_just_finished || scheduler.is_finished())
}

/// Handle a task completion event.
///
/// Completions carrying another run's id are stale and ignored.
pub fn handle_task_completion(
    scheduler: &mut Scheduler,
    task: TaskName,
    run_id: u64,
    outcome: TaskOutcome,
) -> CoreStep {
    if run_id != scheduler.run_id() {
        debug!(
            task = %task,
            run_id,
            current = scheduler.run_id(),
            "ignoring completion from another run"
        );
        return CoreStep {
            commands: Vec::new(),
            keep_running: !scheduler.is_finished(),
        };
    }

    let step = scheduler.step_completion(&task, outcome);
    into_core_step(step.newly_scheduled, scheduler.is_finished())
}

fn into_core_step(newly_ready: Vec<ScheduledTask>, finished: bool) -> CoreStep {
    let mut commands = Vec::new();
    if !newly_ready.is_empty() {
        commands.push(CoreCommand::DispatchTasks(newly_ready));
    }
    if finished {
        commands.push(CoreCommand::RunFinished);
    }
    CoreStep {
        commands,
        keep_running: !finished,
    }
}
