// src/engine/session.rs

//! Long-lived development session: watcher + dev server + trigger queue.

use std::future::Future;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::engine::orchestrator::{Orchestrator, RunReport};
use crate::engine::queue::TriggerQueue;
use crate::engine::TaskName;
use crate::errors::Result;
use crate::server::{DevServer, ReloadNotifier, ServerOptions};
use crate::types::TriggerWhileRunningBehaviour;
use crate::watch::{spawn_watcher, WatchAction, WatchBinding, WatchTrigger, WatcherHandle};

/// Everything a session needs besides the orchestrator.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Directory watched recursively; binding patterns are relative to it.
    pub root: PathBuf,
    pub bindings: Vec<WatchBinding>,
    pub debounce: Duration,
    /// `None` runs without a dev server.
    pub server: Option<ServerOptions>,
    pub behaviour: TriggerWhileRunningBehaviour,
    pub queue_length: usize,
}

impl SessionOptions {
    pub fn new(root: impl Into<PathBuf>, bindings: Vec<WatchBinding>) -> Self {
        Self {
            root: root.into(),
            bindings,
            debounce: Duration::from_millis(100),
            server: None,
            behaviour: TriggerWhileRunningBehaviour::default(),
            queue_length: 1,
        }
    }
}

/// Explicit context object for watch mode.
///
/// Owns the orchestrator, the watcher, the optional dev server and the
/// queue of triggers that arrive while a run is active.
#[derive(Debug)]
pub struct DevSession {
    orchestrator: Orchestrator,
    bindings: Arc<Vec<WatchBinding>>,
    watcher: Option<WatcherHandle>,
    server: Option<DevServer>,
    notifier: Option<ReloadNotifier>,
    trigger_rx: mpsc::Receiver<WatchTrigger>,
    queue: TriggerQueue,
}

impl DevSession {
    /// Start the dev server (if configured) and the watcher.
    pub async fn start(mut orchestrator: Orchestrator, options: SessionOptions) -> Result<Self> {
        let (server, notifier) = match options.server {
            Some(server_opts) => {
                let notifier =
                    ReloadNotifier::new(server_opts.root.clone(), server_opts.inject_changes);
                let server = DevServer::serve(server_opts, notifier.clone()).await?;
                orchestrator.set_notifier(notifier.clone());
                (Some(server), Some(notifier))
            }
            None => (None, None),
        };

        let bindings = Arc::new(options.bindings);
        let (trigger_tx, trigger_rx) = mpsc::channel(64);
        let watcher = spawn_watcher(
            options.root,
            Arc::clone(&bindings),
            options.debounce,
            trigger_tx,
        )?;

        info!(bindings = bindings.len(), "dev session started");
        Ok(Self {
            orchestrator,
            bindings,
            watcher: Some(watcher),
            server,
            notifier,
            trigger_rx,
            queue: TriggerQueue::new(options.behaviour, options.queue_length),
        })
    }

    pub fn server_addr(&self) -> Option<SocketAddr> {
        self.server.as_ref().map(DevServer::local_addr)
    }

    pub fn notifier(&self) -> Option<&ReloadNotifier> {
        self.notifier.as_ref()
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    /// React to watch triggers until Ctrl-C, then stop.
    pub async fn run_until_shutdown(mut self) -> Result<()> {
        let ctrl_c = async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                error!(error = %err, "failed to listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
            info!("Ctrl-C received; shutting down");
        };
        self.run_until(ctrl_c).await;
        self.stop().await
    }

    /// React to watch triggers until `shutdown` resolves.
    ///
    /// While a run is active, new triggers go to the [`TriggerQueue`] and
    /// are drained as one batch when it finishes. A rejected run is logged
    /// and the session keeps listening.
    pub async fn run_until<F>(&mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        loop {
            let trigger = tokio::select! {
                _ = &mut shutdown => return,
                trigger = self.trigger_rx.recv() => match trigger {
                    Some(trigger) => trigger,
                    None => return,
                },
            };

            let Some(mut tasks) = self.accept(trigger) else {
                continue;
            };

            while !tasks.is_empty() {
                let reload = self.wants_reload(&tasks);
                let result = {
                    let run = self.orchestrator.run_many(&tasks);
                    tokio::pin!(run);
                    loop {
                        tokio::select! {
                            result = &mut run => break result,
                            trigger = self.trigger_rx.recv() => match trigger {
                                Some(trigger) => {
                                    if let Some(names) = trigger_tasks(&self.bindings, &trigger) {
                                        for name in names {
                                            self.queue.record_trigger(&name);
                                        }
                                    } else {
                                        self.reload_for_callback(&trigger);
                                    }
                                }
                                None => return,
                            },
                            _ = &mut shutdown => return,
                        }
                    }
                };
                self.finish_run(result, reload);
                tasks = self.queue.drain_pending();
            }
        }
    }

    /// Tasks to run for a trigger received while idle.
    fn accept(&self, trigger: WatchTrigger) -> Option<Vec<TaskName>> {
        let tasks = trigger_tasks(&self.bindings, &trigger);
        if tasks.is_none() {
            self.reload_for_callback(&trigger);
        }
        if let Some(tasks) = &tasks {
            info!(?tasks, paths = ?trigger.paths, "running watched tasks");
        }
        tasks
    }

    fn reload_for_callback(&self, trigger: &WatchTrigger) {
        let reload = self
            .bindings
            .get(trigger.binding)
            .is_some_and(|b| b.reload);
        if reload {
            if let Some(notifier) = &self.notifier {
                notifier.reload();
            }
        }
    }

    fn wants_reload(&self, tasks: &[TaskName]) -> bool {
        self.bindings.iter().any(|b| {
            b.reload
                && b.task_name()
                    .is_some_and(|name| tasks.iter().any(|t| t == name))
        })
    }

    fn finish_run(&self, result: Result<RunReport>, reload: bool) {
        match result {
            Ok(report) => {
                info!(run_id = report.run_id, completed = ?report.completed, "watched run succeeded");
                if reload && !report.outputs_changed {
                    debug!(run_id = report.run_id, "run changed no files; skipping reload");
                } else if reload {
                    if let Some(notifier) = &self.notifier {
                        notifier.reload();
                    }
                }
            }
            Err(err) => {
                error!(error = %err, "watched run rejected; still watching");
            }
        }
    }

    /// Drop the watcher and shut the dev server down.
    pub async fn stop(mut self) -> Result<()> {
        if let Some(watcher) = self.watcher.take() {
            watcher.stop();
        }
        if let Some(server) = self.server.take() {
            server.shutdown().await?;
        }
        if !self.queue.is_empty() {
            warn!("dev session stopped with queued triggers pending");
        }
        info!("dev session stopped");
        Ok(())
    }
}

/// Task names for a trigger, or `None` for callback bindings.
fn trigger_tasks(bindings: &[WatchBinding], trigger: &WatchTrigger) -> Option<Vec<TaskName>> {
    match &bindings.get(trigger.binding)?.action {
        WatchAction::Task(name) => Some(vec![name.clone()]),
        WatchAction::Callback(_) => None,
    }
}
