// src/dag/scheduler.rs

use std::collections::HashMap;

use tracing::{debug, info, warn};

use crate::dag::plan::RunPlan;
use crate::dag::scheduler_step::SchedulerStep;
use crate::dag::state_manager::StateManager;
use crate::dag::task_info::{RunState, ScheduledTask, TaskInfo, TaskRunState};
use crate::engine::TaskOutcome;
use crate::types::{ExecutionPolicy, TaskName};

/// Pure state machine for a single run.
///
/// It is responsible for:
/// - releasing tasks whose dependencies all succeeded
/// - honouring the execution policy (parallel or serial)
/// - aborting the run on the first failure
///
/// It performs no IO; the async shell feeds it completions and dispatches
/// whatever it returns.
#[derive(Debug)]
pub struct Scheduler {
    order: Vec<TaskName>,
    tasks: HashMap<TaskName, TaskInfo>,
    policy: ExecutionPolicy,
    run_id: u64,
    /// Tasks that completed successfully, in completion order.
    completed: Vec<TaskName>,
    /// First failure of this run: task name and reason.
    failure: Option<(TaskName, String)>,
    finished: bool,
}

impl Scheduler {
    pub fn new(plan: &RunPlan, policy: ExecutionPolicy, run_id: u64) -> Self {
        let tasks = plan
            .order()
            .iter()
            .enumerate()
            .map(|(position, name)| {
                (
                    name.clone(),
                    TaskInfo {
                        name: name.clone(),
                        position,
                        deps: plan.dependencies_of(name).to_vec(),
                        run_state: RunState::Pending,
                    },
                )
            })
            .collect();

        Self {
            order: plan.order().to_vec(),
            tasks,
            policy,
            run_id,
            completed: Vec::new(),
            failure: None,
            finished: plan.is_empty(),
        }
    }

    pub fn run_id(&self) -> u64 {
        self.run_id
    }

    pub fn policy(&self) -> ExecutionPolicy {
        self.policy
    }

    /// Plan order of this run.
    pub fn order(&self) -> &[TaskName] {
        &self.order
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn completed(&self) -> &[TaskName] {
        &self.completed
    }

    /// The task that rejected this run, with its reason.
    pub fn failure(&self) -> Option<(&str, &str)> {
        self.failure
            .as_ref()
            .map(|(task, reason)| (task.as_str(), reason.as_str()))
    }

    pub fn run_state_of(&self, task: &str) -> TaskRunState {
        self.tasks.get(task).map(|info| info.run_state).into()
    }

    pub fn running_tasks(&self) -> Vec<TaskName> {
        self.order
            .iter()
            .filter(|name| self.run_state_of(name) == TaskRunState::Running)
            .cloned()
            .collect()
    }

    /// Release the first batch of ready tasks (production API).
    pub fn start(&mut self) -> Vec<ScheduledTask> {
        self.step_start().newly_scheduled
    }

    /// Handle completion of a task (production API).
    pub fn handle_completion(&mut self, task: &str, outcome: TaskOutcome) -> Vec<ScheduledTask> {
        self.step_completion(task, outcome).newly_scheduled
    }

    /// Manual-step variant of [`Scheduler::start`].
    pub fn step_start(&mut self) -> SchedulerStep {
        debug!(run_id = self.run_id, order = ?self.order, "scheduler: starting run");
        let mut manager = StateManager::new(&mut self.tasks, &self.order, self.run_id);
        let newly_scheduled = manager.collect_new_ready_tasks(self.policy);
        let run_just_finished = self.maybe_finish_run();

        SchedulerStep {
            newly_scheduled,
            newly_failed: Vec::new(),
            run_just_finished,
        }
    }

    /// Manual-step variant of [`Scheduler::handle_completion`].
    pub fn step_completion(&mut self, task: &str, outcome: TaskOutcome) -> SchedulerStep {
        let mut step = SchedulerStep::default();

        let Some(info) = self.tasks.get_mut(task) else {
            warn!(task = %task, run_id = self.run_id, "completion for task not in this run; ignoring");
            return step;
        };
        if info.run_state != RunState::Running {
            warn!(task = %task, state = ?info.run_state, "completion for task that is not running; ignoring");
            return step;
        }

        let aborted = self.failure.is_some();
        match outcome {
            TaskOutcome::Success => {
                info.run_state = RunState::DoneSuccess;
                if aborted {
                    debug!(task = %task, "task finished after the run was aborted; ignoring");
                } else {
                    self.completed.push(task.to_string());
                }
            }
            TaskOutcome::Failed(reason) => {
                info.run_state = RunState::DoneFailed;
                if aborted {
                    debug!(task = %task, %reason, "task failed after the run was aborted; ignoring");
                } else {
                    warn!(task = %task, run_id = self.run_id, %reason, "task failed; aborting run");
                    step.newly_failed.push(task.to_string());
                    self.failure = Some((task.to_string(), reason));
                    let mut manager = StateManager::new(&mut self.tasks, &self.order, self.run_id);
                    step.newly_failed.extend(manager.abort_pending());
                }
            }
        }

        if self.failure.is_none() {
            let mut manager = StateManager::new(&mut self.tasks, &self.order, self.run_id);
            step.newly_scheduled = manager.collect_new_ready_tasks(self.policy);
        }

        step.run_just_finished = self.maybe_finish_run();
        step
    }

    /// Mark the run finished once every task is terminal, or as soon as a
    /// failure leaves nothing pending. Siblings still running at that point
    /// are detached; their completions no longer affect the run.
    ///
    /// Returns `true` if this call transitioned the run to finished.
    fn maybe_finish_run(&mut self) -> bool {
        if self.finished {
            return false;
        }
        let manager = StateManager::new(&mut self.tasks, &self.order, self.run_id);
        let done = if self.failure.is_some() {
            !manager.any_pending()
        } else {
            manager.all_tasks_terminal()
        };
        if !done {
            return false;
        }

        let detached = self.running_tasks();
        info!(
            run_id = self.run_id,
            failed = self.failure.is_some(),
            ?detached,
            "scheduler: run finished"
        );
        self.finished = true;
        true
    }
}
