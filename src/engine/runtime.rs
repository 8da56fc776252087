// src/engine/runtime.rs

use std::fmt;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::dag::ScheduledTask;
use crate::errors::Result;
use crate::exec::ExecutorBackend;

use super::core::CoreRuntime;
use super::{CoreCommand, RuntimeEvent};

/// Drives one run of the scheduler in response to [`RuntimeEvent`]s and
/// delegates task execution to an [`ExecutorBackend`].
///
/// This is an IO shell around [`CoreRuntime`], which holds all the run
/// semantics.
pub struct Runtime<E: ExecutorBackend> {
    core: CoreRuntime,
    event_rx: mpsc::Receiver<RuntimeEvent>,
    executor: E,
}

impl<E: ExecutorBackend> fmt::Debug for Runtime<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("core", &self.core)
            .finish_non_exhaustive()
    }
}

impl<E: ExecutorBackend> Runtime<E> {
    pub fn new(core: CoreRuntime, event_rx: mpsc::Receiver<RuntimeEvent>, executor: E) -> Self {
        Self {
            core,
            event_rx,
            executor,
        }
    }

    /// Run until the scheduler reports the run finished, then hand back the
    /// core so the caller can inspect the outcome. Tasks still running after
    /// an aborted run report into a closed channel.
    pub async fn run(mut self) -> Result<CoreRuntime> {
        let step = self.core.start();
        let mut keep_running = step.keep_running;
        for command in step.commands {
            self.execute_command(command).await?;
        }

        while keep_running {
            let Some(event) = self.event_rx.recv().await else {
                warn!("runtime event channel closed before the run finished");
                break;
            };
            debug!(?event, "runtime received event");

            let step = self.core.step(event);
            keep_running = step.keep_running;
            for command in step.commands {
                self.execute_command(command).await?;
            }
        }

        Ok(self.core)
    }

    async fn execute_command(&mut self, command: CoreCommand) -> Result<()> {
        match command {
            CoreCommand::DispatchTasks(tasks) => self.spawn_ready(tasks).await,
            CoreCommand::RunFinished => {
                debug!(run_id = self.core.scheduler().run_id(), "run finished");
                Ok(())
            }
        }
    }

    async fn spawn_ready(&mut self, tasks: Vec<ScheduledTask>) -> Result<()> {
        if tasks.is_empty() {
            return Ok(());
        }

        let names: Vec<_> = tasks.iter().map(|t| t.name.as_str()).collect();
        debug!(?names, "spawning ready tasks");

        self.executor.spawn_ready_tasks(tasks).await
    }
}
