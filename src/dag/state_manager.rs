// src/dag/state_manager.rs

//! Per-run state transitions for tasks in the scheduler.

use std::collections::HashMap;

use tracing::{debug, info, warn};

use crate::dag::task_info::{RunState, ScheduledTask, TaskInfo};
use crate::types::{ExecutionPolicy, TaskName};

/// Manages per-run state transitions for tasks.
pub struct StateManager<'a> {
    tasks: &'a mut HashMap<TaskName, TaskInfo>,
    /// Plan order; ready tasks are released in this order.
    order: &'a [TaskName],
    run_id: u64,
}

impl<'a> StateManager<'a> {
    pub fn new(
        tasks: &'a mut HashMap<TaskName, TaskInfo>,
        order: &'a [TaskName],
        run_id: u64,
    ) -> Self {
        Self {
            tasks,
            order,
            run_id,
        }
    }

    /// A task is ready when every run-scoped dependency succeeded.
    pub fn deps_satisfied_for_info(&self, info: &TaskInfo) -> bool {
        info.deps.iter().all(|dep| match self.tasks.get(dep) {
            Some(d) => d.run_state == RunState::DoneSuccess,
            None => {
                warn!(task = %info.name, dep = %dep, "dependency missing from run plan");
                false
            }
        })
    }

    fn running_count(&self) -> usize {
        self.tasks
            .values()
            .filter(|t| t.run_state == RunState::Running)
            .count()
    }

    /// Collect `Pending` tasks whose dependencies succeeded, mark them
    /// `Running` and return them in plan order.
    ///
    /// Under [`ExecutionPolicy::Serial`] at most one task is running at a
    /// time, so at most one task is released and only when nothing runs.
    pub fn collect_new_ready_tasks(&mut self, policy: ExecutionPolicy) -> Vec<ScheduledTask> {
        let limit = match policy {
            ExecutionPolicy::Parallel => usize::MAX,
            ExecutionPolicy::Serial => {
                if self.running_count() > 0 {
                    return Vec::new();
                }
                1
            }
        };

        let candidates: Vec<TaskName> = self
            .order
            .iter()
            .filter(|name| {
                self.tasks.get(name.as_str()).is_some_and(|info| {
                    info.run_state == RunState::Pending && self.deps_satisfied_for_info(info)
                })
            })
            .take(limit)
            .cloned()
            .collect();

        let mut ready = Vec::with_capacity(candidates.len());
        for name in candidates {
            if let Some(info) = self.tasks.get_mut(&name) {
                info!(task = %info.name, run_id = self.run_id, "starting task");
                info.run_state = RunState::Running;
                ready.push(ScheduledTask::from_task_info(info, self.run_id));
            }
        }

        ready
    }

    /// Mark every `Pending` task as failed so it never starts.
    ///
    /// Running tasks are left alone; they finish on their own.
    pub fn abort_pending(&mut self) -> Vec<TaskName> {
        let mut aborted = Vec::new();
        for name in self.order {
            if let Some(info) = self.tasks.get_mut(name) {
                if info.run_state == RunState::Pending {
                    debug!(task = %info.name, "run aborted; task will not start");
                    info.run_state = RunState::DoneFailed;
                    aborted.push(info.name.clone());
                }
            }
        }
        aborted
    }

    pub fn any_pending(&self) -> bool {
        self.tasks
            .values()
            .any(|info| info.run_state == RunState::Pending)
    }

    pub fn all_tasks_terminal(&self) -> bool {
        !self
            .tasks
            .values()
            .any(|info| matches!(info.run_state, RunState::Pending | RunState::Running))
    }
}
