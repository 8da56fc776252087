// src/exec/task_runner.rs

//! Runs a single task body and reports its completion.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::dag::ScheduledTask;
use crate::engine::{RuntimeEvent, TaskOutcome};
use crate::registry::{TaskBody, TaskContext};

/// Run a task body to completion and emit exactly one `TaskCompleted`
/// event, even if the body panics.
pub async fn run_task(
    task: ScheduledTask,
    body: Arc<dyn TaskBody>,
    ctx: TaskContext,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
) {
    let started = Instant::now();

    let handle = tokio::spawn(async move { body.run(&ctx).await });
    let outcome = match handle.await {
        Ok(Ok(())) => TaskOutcome::Success,
        Ok(Err(err)) => TaskOutcome::Failed(format!("{err:#}")),
        Err(join_err) => TaskOutcome::Failed(format!("task body panicked: {join_err}")),
    };

    let elapsed_ms = started.elapsed().as_millis() as u64;
    match &outcome {
        TaskOutcome::Success => {
            info!(task = %task.name, run_id = task.run_id, elapsed_ms, "finished task")
        }
        TaskOutcome::Failed(reason) => error!(
            task = %task.name,
            run_id = task.run_id,
            elapsed_ms,
            %reason,
            "task failed"
        ),
    }

    if runtime_tx
        .send(RuntimeEvent::TaskCompleted {
            task: task.name.clone(),
            run_id: task.run_id,
            outcome,
        })
        .await
        .is_err()
    {
        debug!(task = %task.name, "runtime gone; dropping completion");
    }
}
