// src/engine/core.rs

//! Pure core runtime state machine.
//!
//! The core consumes [`RuntimeEvent`]s and produces an updated state plus
//! a list of commands describing what the IO shell should do next. It has
//! no channels, no Tokio types and performs no IO, so it can be unit tested
//! by feeding it events by hand.

use crate::dag::Scheduler;
use crate::engine::event_handlers::{handle_run_start, handle_task_completion, CoreStep};
use crate::engine::RuntimeEvent;

#[derive(Debug)]
pub struct CoreRuntime {
    scheduler: Scheduler,
}

impl CoreRuntime {
    pub fn new(scheduler: Scheduler) -> Self {
        Self { scheduler }
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn into_scheduler(self) -> Scheduler {
        self.scheduler
    }

    pub fn is_finished(&self) -> bool {
        self.scheduler.is_finished()
    }

    /// Commands that start the run.
    pub fn start(&mut self) -> CoreStep {
        handle_run_start(&mut self.scheduler)
    }

    /// Handle a single runtime event.
    pub fn step(&mut self, event: RuntimeEvent) -> CoreStep {
        match event {
            RuntimeEvent::TaskCompleted {
                task,
                run_id,
                outcome,
            } => handle_task_completion(&mut self.scheduler, task, run_id, outcome),
        }
    }
}
