// src/engine/orchestrator.rs

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::info;

use crate::dag::{DagGraph, RunPlan, Scheduler};
use crate::engine::core::CoreRuntime;
use crate::engine::runtime::Runtime;
use crate::engine::{RuntimeEvent, TaskName};
use crate::errors::{AssetflowError, Result};
use crate::exec::{ExecutorBackend, RealExecutorBackend};
use crate::registry::{OutputTracker, TaskContext, TaskRegistry};
use crate::server::ReloadNotifier;
use crate::types::ExecutionPolicy;

/// Result of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub run_id: u64,
    /// Plan order (topological, ties by declaration order).
    pub order: Vec<TaskName>,
    /// Tasks in the order they completed.
    pub completed: Vec<TaskName>,
    /// Whether any task wrote, removed or may have changed files. Runs with
    /// a custom backend always report `true`.
    pub outputs_changed: bool,
}

/// Plans and runs requested tasks against a validated registry.
#[derive(Debug)]
pub struct Orchestrator {
    registry: Arc<TaskRegistry>,
    graph: DagGraph,
    policy: ExecutionPolicy,
    ctx: TaskContext,
    run_counter: AtomicU64,
}

impl Orchestrator {
    /// Validates the registry; an invalid one never runs anything.
    pub fn new(registry: TaskRegistry, ctx: TaskContext) -> Result<Self> {
        registry.validate()?;
        let graph = DagGraph::from_registry(&registry);
        Ok(Self {
            registry: Arc::new(registry),
            graph,
            policy: ExecutionPolicy::default(),
            ctx,
            run_counter: AtomicU64::new(0),
        })
    }

    pub fn with_policy(mut self, policy: ExecutionPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Let task bodies push changes to connected browsers.
    pub fn set_notifier(&mut self, notifier: ReloadNotifier) {
        self.ctx.notifier = Some(notifier);
    }

    pub fn registry(&self) -> &TaskRegistry {
        &self.registry
    }

    pub fn policy(&self) -> ExecutionPolicy {
        self.policy
    }

    pub fn plan(&self, tasks: &[TaskName]) -> Result<RunPlan> {
        RunPlan::build(&self.graph, tasks)
    }

    pub async fn run(&self, task: &str) -> Result<RunReport> {
        self.run_many(&[task.to_string()]).await
    }

    /// Run the requested tasks and everything they depend on.
    pub async fn run_many(&self, tasks: &[TaskName]) -> Result<RunReport> {
        let registry = Arc::clone(&self.registry);
        let mut ctx = self.ctx.clone();
        ctx.outputs = OutputTracker::default();
        let outputs = ctx.outputs.clone();

        let mut report = self
            .run_with(tasks, move |tx| RealExecutorBackend::new(registry, ctx, tx))
            .await?;
        report.outputs_changed = outputs.changed();
        Ok(report)
    }

    /// Like [`run_many`](Orchestrator::run_many) with a custom executor
    /// backend, built from the runtime's event sender.
    pub async fn run_with<E, F>(&self, tasks: &[TaskName], make_backend: F) -> Result<RunReport>
    where
        E: ExecutorBackend,
        F: FnOnce(mpsc::Sender<RuntimeEvent>) -> E,
    {
        let plan = self.plan(tasks)?;
        let run_id = self.run_counter.fetch_add(1, Ordering::SeqCst) + 1;
        info!(run_id, requested = ?tasks, order = ?plan.order(), policy = ?self.policy, "starting run");

        let scheduler = Scheduler::new(&plan, self.policy, run_id);
        let (tx, rx) = mpsc::channel::<RuntimeEvent>(64);
        let backend = make_backend(tx);

        let core = Runtime::new(CoreRuntime::new(scheduler), rx, backend)
            .run()
            .await?;
        let scheduler = core.into_scheduler();

        if let Some((task, reason)) = scheduler.failure() {
            return Err(AssetflowError::TaskRejection {
                task: task.to_string(),
                reason: reason.to_string(),
            });
        }
        if !scheduler.is_finished() {
            return Err(AssetflowError::TaskRejection {
                task: scheduler.running_tasks().join(", "),
                reason: "run ended before every task completed".to_string(),
            });
        }

        info!(run_id, completed = scheduler.completed().len(), "run finished");
        Ok(RunReport {
            run_id,
            order: plan.order().to_vec(),
            completed: scheduler.completed().to_vec(),
            outputs_changed: true,
        })
    }
}
