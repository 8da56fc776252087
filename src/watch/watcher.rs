// src/watch/watcher.rs

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::watch::debounce::Debouncer;
use crate::watch::path_utils::relative_str;
use crate::watch::patterns::{bindings_for_paths, WatchAction, WatchBinding};

/// A binding fired: `paths` are the debounced, root-relative paths it matched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchTrigger {
    pub binding: usize,
    pub paths: Vec<String>,
}

/// Handle for the filesystem watcher.
///
/// Keeps the underlying `RecommendedWatcher` alive; dropping the handle (or
/// calling [`stop`](WatcherHandle::stop)) ends the subscription.
pub struct WatcherHandle {
    _inner: RecommendedWatcher,
    stop_tx: Option<oneshot::Sender<()>>,
}

impl std::fmt::Debug for WatcherHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatcherHandle").finish_non_exhaustive()
    }
}

impl WatcherHandle {
    pub fn stop(mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        debug!("file watcher stopped");
    }
}

/// Watch `root` recursively and report bindings whose patterns match
/// changed paths.
///
/// Events are debounced per path with a trailing `debounce` window. When
/// paths are flushed, every matching binding fires once: callbacks run
/// inline, task bindings (and callbacks with `reload`) are sent on
/// `trigger_tx` as [`WatchTrigger`]s.
pub fn spawn_watcher(
    root: impl Into<PathBuf>,
    bindings: Arc<Vec<WatchBinding>>,
    debounce: Duration,
    trigger_tx: mpsc::Sender<WatchTrigger>,
) -> Result<WatcherHandle> {
    let root = root.into();
    let root = root.canonicalize().unwrap_or(root);

    // Channel from the blocking notify callback into the async world.
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<Event>();

    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| match res {
            Ok(event) => {
                let _ = event_tx.send(event);
            }
            Err(err) => {
                warn!(error = %err, "file watch error");
            }
        },
        Config::default(),
    )?;
    watcher.watch(&root, RecursiveMode::Recursive)?;
    info!("file watcher started on {:?}", root);

    let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
    let loop_root = root.clone();

    tokio::spawn(async move {
        let mut debouncer = Debouncer::new(debounce);

        loop {
            let deadline = debouncer.next_deadline();
            tokio::select! {
                _ = &mut stop_rx => break,
                maybe_event = event_rx.recv() => {
                    let Some(event) = maybe_event else { break };
                    if matches!(event.kind, EventKind::Access(_)) {
                        continue;
                    }
                    let now = Instant::now().into_std();
                    for path in &event.paths {
                        match relative_str(&loop_root, path) {
                            Some(rel) if !rel.is_empty() => debouncer.record(rel, now),
                            _ => debug!(?path, "ignoring event outside the watch root"),
                        }
                    }
                }
                _ = sleep_until(deadline) => {
                    let ready = debouncer.take_ready(Instant::now().into_std());
                    if ready.is_empty() {
                        continue;
                    }
                    debug!(paths = ?ready, "debounced changes flushed");
                    if !dispatch(&bindings, &ready, &trigger_tx).await {
                        break;
                    }
                }
            }
        }
        debug!("watcher event loop finished");
    });

    Ok(WatcherHandle {
        _inner: watcher,
        stop_tx: Some(stop_tx),
    })
}

async fn sleep_until(deadline: Option<std::time::Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(Instant::from_std(deadline)).await,
        None => std::future::pending().await,
    }
}

/// Fire every binding matching `paths`. Returns `false` once the receiver
/// is gone.
async fn dispatch(
    bindings: &[WatchBinding],
    paths: &[String],
    trigger_tx: &mpsc::Sender<WatchTrigger>,
) -> bool {
    for (binding, matched) in bindings_for_paths(bindings, paths) {
        let entry = &bindings[binding];
        if let WatchAction::Callback(callback) = &entry.action {
            callback(&matched);
            if !entry.reload {
                continue;
            }
        }
        info!(binding, action = ?entry.action, paths = ?matched, "watch binding triggered");
        if trigger_tx
            .send(WatchTrigger {
                binding,
                paths: matched,
            })
            .await
            .is_err()
        {
            warn!("watch trigger receiver dropped; stopping watcher loop");
            return false;
        }
    }
    true
}
