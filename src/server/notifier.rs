// src/server/notifier.rs

use std::path::{Path, PathBuf};

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, info};

/// What connected browsers are told to do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ReloadEvent {
    /// Full page reload.
    Reload,
    /// Swap these stylesheets in place; URL paths relative to the server root.
    Inject { paths: Vec<String> },
}

impl ReloadEvent {
    /// SSE event name.
    pub fn name(&self) -> &'static str {
        match self {
            ReloadEvent::Reload => "reload",
            ReloadEvent::Inject { .. } => "inject",
        }
    }
}

/// A set of changed (or freshly written) files.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    pub paths: Vec<PathBuf>,
}

impl ChangeSet {
    pub fn new(paths: Vec<PathBuf>) -> Self {
        Self { paths }
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// True when every path is a stylesheet.
    pub fn is_css_only(&self) -> bool {
        !self.paths.is_empty()
            && self.paths.iter().all(|p| {
                p.extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| e.eq_ignore_ascii_case("css"))
            })
    }
}

/// Broadcasts reload events to every connected browser.
///
/// Cloning is cheap; all clones share the same channel.
#[derive(Debug, Clone)]
pub struct ReloadNotifier {
    tx: broadcast::Sender<ReloadEvent>,
    root: PathBuf,
    inject_changes: bool,
}

impl ReloadNotifier {
    /// `root` is the directory the dev server serves; changed paths below it
    /// map to URL paths.
    pub fn new(root: impl Into<PathBuf>, inject_changes: bool) -> Self {
        let (tx, _) = broadcast::channel(64);
        Self {
            tx,
            root: root.into(),
            inject_changes,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ReloadEvent> {
        self.tx.subscribe()
    }

    /// Number of connected browsers.
    pub fn client_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Tell browsers about a change set.
    ///
    /// A CSS-only change set is injected when `inject_changes` is on;
    /// anything else triggers a full reload. Returns the event sent.
    pub fn notify(&self, changes: &ChangeSet) -> ReloadEvent {
        let event = if self.inject_changes && changes.is_css_only() {
            ReloadEvent::Inject {
                paths: changes.paths.iter().map(|p| self.url_path(p)).collect(),
            }
        } else {
            ReloadEvent::Reload
        };
        self.send(event.clone());
        event
    }

    /// Ask every browser for a full reload.
    pub fn reload(&self) -> ReloadEvent {
        self.send(ReloadEvent::Reload);
        ReloadEvent::Reload
    }

    fn send(&self, event: ReloadEvent) {
        match self.tx.send(event) {
            Ok(clients) => info!(clients, "sent reload event"),
            Err(broadcast::error::SendError(event)) => {
                debug!(?event, "no browsers connected; reload event dropped")
            }
        }
    }

    /// URL path of a file: relative to the served root, with a leading `/`.
    /// Files outside the root fall back to their file name.
    pub fn url_path(&self, path: &Path) -> String {
        let rel = path
            .strip_prefix(&self.root)
            .ok()
            .or_else(|| path.file_name().map(Path::new))
            .unwrap_or(path);
        format!("/{}", rel.to_string_lossy().replace('\\', "/"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn css_only_change_is_injected() {
        let notifier = ReloadNotifier::new("site/src", true);
        let _rx = notifier.subscribe();
        let event = notifier.notify(&ChangeSet::new(vec![PathBuf::from("site/src/css/style.css")]));
        assert_eq!(
            event,
            ReloadEvent::Inject {
                paths: vec!["/css/style.css".to_string()]
            }
        );
    }

    #[test]
    fn mixed_change_reloads() {
        let notifier = ReloadNotifier::new("src", true);
        let event = notifier.notify(&ChangeSet::new(vec![
            PathBuf::from("src/css/style.css"),
            PathBuf::from("src/index.html"),
        ]));
        assert_eq!(event, ReloadEvent::Reload);
    }

    #[test]
    fn inject_disabled_reloads() {
        let notifier = ReloadNotifier::new("src", false);
        let event = notifier.notify(&ChangeSet::new(vec![PathBuf::from("src/a.css")]));
        assert_eq!(event, ReloadEvent::Reload);
    }
}
