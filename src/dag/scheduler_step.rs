// src/dag/scheduler_step.rs

use crate::dag::task_info::ScheduledTask;
use crate::types::TaskName;

/// Structured result of a single scheduler "step".
///
/// Tests use this to step a run by hand and assert on what changed.
#[derive(Debug, Clone, Default)]
pub struct SchedulerStep {
    /// Tasks that became ready to run as a result of this step.
    pub newly_scheduled: Vec<ScheduledTask>,
    /// Tasks newly marked as failed: the failing task plus every pending
    /// task that will now never start.
    pub newly_failed: Vec<TaskName>,
    /// Whether this step finished the run.
    pub run_just_finished: bool,
}
