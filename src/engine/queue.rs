// src/engine/queue.rs

use std::collections::VecDeque;

use tracing::{debug, warn};

use crate::types::{TaskName, TriggerWhileRunningBehaviour};

/// Triggers that arrive while a run is already executing.
///
/// Semantics:
/// - Each queued entry is a *batch* of task names to run together once the
///   current run finishes.
/// - `max_runs` (`queue_length`) bounds how many batches are kept; the
///   default of 1 means "at most one future run is queued".
/// - [`drain_pending`](TriggerQueue::drain_pending) merges every queued
///   batch into one list, in first-trigger order.
#[derive(Debug)]
pub struct TriggerQueue {
    behaviour: TriggerWhileRunningBehaviour,
    max_runs: usize,
    runs: VecDeque<Vec<TaskName>>,
}

impl TriggerQueue {
    /// `max_runs` is clamped to at least 1.
    pub fn new(behaviour: TriggerWhileRunningBehaviour, max_runs: usize) -> Self {
        Self {
            behaviour,
            max_runs: max_runs.max(1),
            runs: VecDeque::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    /// Record that a task was triggered while a run is in progress.
    ///
    /// - `Queue`: merge into the last batch (or start the first one); drop
    ///   the oldest batches beyond `max_runs`.
    /// - `Cancel`: forget every queued batch and keep only this task. The
    ///   active run itself is not interrupted.
    pub fn record_trigger(&mut self, task: &str) {
        let name = task.to_string();

        match self.behaviour {
            TriggerWhileRunningBehaviour::Queue => {
                match self.runs.back_mut() {
                    Some(batch) => {
                        if !batch.contains(&name) {
                            batch.push(name.clone());
                        }
                        debug!(task = %name, "merged trigger into last queued batch");
                    }
                    None => {
                        self.runs.push_back(vec![name.clone()]);
                        debug!(task = %name, "created first queued batch");
                    }
                }

                if self.runs.len() > self.max_runs {
                    warn!(
                        current_batches = self.runs.len(),
                        max_runs = self.max_runs,
                        "exceeded queue_length; dropping oldest queued batches"
                    );
                    while self.runs.len() > self.max_runs {
                        self.runs.pop_front();
                    }
                }
            }
            TriggerWhileRunningBehaviour::Cancel => {
                debug!(task = %name, "replacing queued batches with this task (cancel mode)");
                self.runs.clear();
                self.runs.push_back(vec![name]);
            }
        }
    }

    /// Drain every queued batch into one de-duplicated list.
    pub fn drain_pending(&mut self) -> Vec<TaskName> {
        let mut merged: Vec<TaskName> = Vec::new();
        while let Some(batch) = self.runs.pop_front() {
            for name in batch {
                if !merged.contains(&name) {
                    merged.push(name);
                }
            }
        }
        debug!(drained = merged.len(), "drained queued triggers");
        merged
    }
}
