// src/watch/patterns.rs

use std::fmt;
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::config::WatchConfig;
use crate::pipeline::FileMatcher;
use crate::types::TaskName;

/// Callback invoked with the changed paths (relative to the project root).
pub type WatchCallback = Arc<dyn Fn(&[String]) + Send + Sync>;

/// What a binding does when one of its patterns matches.
#[derive(Clone)]
pub enum WatchAction {
    /// Run a registered task (and its dependencies).
    Task(TaskName),
    Callback(WatchCallback),
}

impl fmt::Debug for WatchAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WatchAction::Task(name) => f.debug_tuple("Task").field(name).finish(),
            WatchAction::Callback(_) => f.write_str("Callback(..)"),
        }
    }
}

/// Glob patterns mapped to an action, plus whether browsers reload after
/// the action succeeds.
#[derive(Debug, Clone)]
pub struct WatchBinding {
    pub matcher: FileMatcher,
    pub action: WatchAction,
    pub reload: bool,
}

impl WatchBinding {
    pub fn task<S: AsRef<str>>(patterns: &[S], task: impl Into<TaskName>, reload: bool) -> Result<Self> {
        Ok(Self {
            matcher: FileMatcher::new(patterns)?,
            action: WatchAction::Task(task.into()),
            reload,
        })
    }

    pub fn callback<S: AsRef<str>>(patterns: &[S], callback: WatchCallback, reload: bool) -> Result<Self> {
        Ok(Self {
            matcher: FileMatcher::new(patterns)?,
            action: WatchAction::Callback(callback),
            reload,
        })
    }

    pub fn from_config(cfg: &WatchConfig) -> Result<Self> {
        Self::task(&cfg.patterns, cfg.task.clone(), cfg.reload)
            .with_context(|| format!("invalid [[watch]] patterns for task '{}'", cfg.task))
    }

    pub fn task_name(&self) -> Option<&str> {
        match &self.action {
            WatchAction::Task(name) => Some(name),
            WatchAction::Callback(_) => None,
        }
    }

    pub fn matches(&self, rel_path: &str) -> bool {
        self.matcher.matches(rel_path)
    }
}

pub fn bindings_from_config(watch: &[WatchConfig]) -> Result<Vec<WatchBinding>> {
    watch.iter().map(WatchBinding::from_config).collect()
}

/// For each binding matching at least one path, its index and the paths it
/// matched. Each binding appears at most once.
pub fn bindings_for_paths(bindings: &[WatchBinding], rel_paths: &[String]) -> Vec<(usize, Vec<String>)> {
    bindings
        .iter()
        .enumerate()
        .filter_map(|(idx, binding)| {
            let matched: Vec<String> = rel_paths
                .iter()
                .filter(|p| binding.matches(p))
                .cloned()
                .collect();
            (!matched.is_empty()).then_some((idx, matched))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn each_binding_fires_once_per_batch() {
        let bindings = vec![
            WatchBinding::task(&["src/scss/**/*.scss"], "sass", true).unwrap(),
            WatchBinding::task(&["src/**/*.html"], "html", true).unwrap(),
            WatchBinding::task(&["src/js/*.js"], "js", false).unwrap(),
        ];
        let changed = vec![
            "src/scss/a.scss".to_string(),
            "src/scss/partials/_b.scss".to_string(),
            "src/index.html".to_string(),
        ];

        let hits = bindings_for_paths(&bindings, &changed);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].0, 0);
        assert_eq!(hits[0].1.len(), 2);
        assert_eq!(hits[1], (1, vec!["src/index.html".to_string()]));
    }
}
