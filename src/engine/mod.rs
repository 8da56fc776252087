// src/engine/mod.rs

//! Orchestration engine.
//!
//! This module ties together:
//! - the per-run scheduler (pure, in [`core`])
//! - the async shell that dispatches tasks to an executor ([`runtime`])
//! - the [`Orchestrator`] entry point that plans and runs requested tasks
//! - the [`DevSession`] that reacts to watch triggers, queues them while a
//!   run is active, and drives live reload

pub use crate::types::TaskName;

/// Outcome of a task body for the scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Success,
    /// The body returned an error (or panicked); the string is its reason.
    Failed(String),
}

/// Events flowing into the runtime from the executor.
#[derive(Debug, Clone)]
pub enum RuntimeEvent {
    /// A task body finished.
    TaskCompleted {
        task: TaskName,
        run_id: u64,
        outcome: TaskOutcome,
    },
}

pub mod core;
pub mod event_handlers;
pub mod orchestrator;
pub mod queue;
pub mod runtime;
pub mod session;

pub use core::CoreRuntime;
pub use event_handlers::{CoreCommand, CoreStep};
pub use orchestrator::{Orchestrator, RunReport};
pub use queue::TriggerQueue;
pub use runtime::Runtime;
pub use session::{DevSession, SessionOptions};
pub use crate::types::TriggerWhileRunningBehaviour;
