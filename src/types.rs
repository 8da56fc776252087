use serde::Deserialize;

/// Canonical task name type used throughout the crate.
pub type TaskName = String;

/// Behaviour when a watch trigger arrives while a run is already in progress.
///
/// - `Queue`: remember the trigger and start a new run when the current one
///   finishes (default behaviour).
/// - `Cancel`: drop any previously queued batch and only keep the latest
///   trigger. The active run itself is never interrupted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerWhileRunningBehaviour {
    #[default]
    Queue,
    Cancel,
}

/// How ready tasks are released by the scheduler.
///
/// A dependency edge always means "completion before start". The policy only
/// decides what happens to tasks that have no edge between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionPolicy {
    /// Every task whose dependencies have succeeded starts immediately.
    #[default]
    Parallel,
    /// At most one task runs at a time, in topological order.
    Serial,
}

/// Output style for the SASS compiler step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CssStyle {
    #[default]
    Expanded,
    Compressed,
}
