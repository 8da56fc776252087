// src/exec/backend.rs

//! Pluggable executor backend.
//!
//! The runtime talks to an `ExecutorBackend` instead of spawning bodies
//! itself, so tests can swap in a fake that records scheduled tasks and
//! emits `TaskCompleted` events directly.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::warn;

use crate::dag::ScheduledTask;
use crate::engine::{RuntimeEvent, TaskOutcome};
use crate::errors::Result;
use crate::exec::task_runner::run_task;
use crate::registry::{TaskContext, TaskRegistry};

/// Trait abstracting how scheduled tasks are executed.
pub trait ExecutorBackend: Send {
    /// Dispatch the given tasks for execution. Each dispatched task must
    /// eventually produce one `TaskCompleted` event.
    fn spawn_ready_tasks(
        &mut self,
        tasks: Vec<ScheduledTask>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

/// Production backend: runs registered task bodies as Tokio tasks.
pub struct RealExecutorBackend {
    registry: Arc<TaskRegistry>,
    ctx: TaskContext,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
}

impl RealExecutorBackend {
    pub fn new(
        registry: Arc<TaskRegistry>,
        ctx: TaskContext,
        runtime_tx: mpsc::Sender<RuntimeEvent>,
    ) -> Self {
        Self {
            registry,
            ctx,
            runtime_tx,
        }
    }
}

impl ExecutorBackend for RealExecutorBackend {
    fn spawn_ready_tasks(
        &mut self,
        tasks: Vec<ScheduledTask>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            for task in tasks {
                let body = match self.registry.get(&task.name) {
                    Ok(t) => Arc::clone(&t.body),
                    Err(err) => {
                        warn!(task = %task.name, "scheduled task is not registered");
                        let _ = self
                            .runtime_tx
                            .send(RuntimeEvent::TaskCompleted {
                                task: task.name.clone(),
                                run_id: task.run_id,
                                outcome: TaskOutcome::Failed(err.to_string()),
                            })
                            .await;
                        continue;
                    }
                };

                let mut ctx = self.ctx.clone();
                ctx.run_id = task.run_id;
                tokio::spawn(run_task(task, body, ctx, self.runtime_tx.clone()));
            }
            Ok(())
        })
    }
}
