// src/watch/debounce.rs

use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Per-path trailing debouncer.
///
/// Every event for a path pushes that path's deadline to `now + window`; a
/// path is released once its deadline passes without further events. Time
/// is passed in explicitly so the logic can be tested without sleeping.
#[derive(Debug, Clone)]
pub struct Debouncer {
    window: Duration,
    pending: HashMap<String, Instant>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: HashMap::new(),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Record an event for `path` at `now`.
    pub fn record(&mut self, path: impl Into<String>, now: Instant) {
        self.pending.insert(path.into(), now + self.window);
    }

    /// Earliest deadline among pending paths.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().min().copied()
    }

    /// Remove and return (sorted) every path whose deadline is at or before `now`.
    pub fn take_ready(&mut self, now: Instant) -> Vec<String> {
        let mut ready: Vec<String> = self
            .pending
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(path, _)| path.clone())
            .collect();
        for path in &ready {
            self.pending.remove(path);
        }
        ready.sort();
        ready
    }
}
