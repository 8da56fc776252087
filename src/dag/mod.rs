// src/dag/mod.rs

//! Task graph, run planning and scheduling.
//!
//! - [`graph`] holds the registry's tasks as an adjacency map.
//! - [`plan`] turns a set of requested tasks into a [`RunPlan`].
//! - [`scheduler`] is the per-run state machine that decides which tasks
//!   are ready to run.
//! - [`task_info`] provides per-run task state and scheduled task types.
//! - [`scheduler_step`] defines the result type for scheduler steps.
//! - [`state_manager`] manages per-run state transitions.

pub mod graph;
pub mod plan;
pub mod scheduler;
pub mod scheduler_step;
pub mod state_manager;
pub mod task_info;

pub use graph::DagGraph;
pub use plan::{dependency_edges, RunPlan};
pub use scheduler::Scheduler;
pub use scheduler_step::SchedulerStep;
pub use task_info::{ScheduledTask, TaskRunState};
