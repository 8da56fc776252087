use std::sync::{Arc, Mutex};
use std::time::Duration;

use assetflow::registry::{FnBody, TaskBody};

/// Shared log of `start:<task>` / `end:<task>` entries.
pub type EventLog = Arc<Mutex<Vec<String>>>;

pub fn event_log() -> EventLog {
    Arc::new(Mutex::new(Vec::new()))
}

/// A body that logs its start and end around a short sleep.
pub fn recording_body(log: &EventLog, name: &str, delay: Duration) -> Arc<dyn TaskBody> {
    let log = Arc::clone(log);
    let name = name.to_string();
    Arc::new(FnBody::new(move |_ctx| {
        let log = Arc::clone(&log);
        let name = name.clone();
        async move {
            log.lock().unwrap().push(format!("start:{name}"));
            tokio::time::sleep(delay).await;
            log.lock().unwrap().push(format!("end:{name}"));
            Ok(())
        }
    }))
}

/// A body that logs its start and then fails.
pub fn failing_body(log: &EventLog, name: &str) -> Arc<dyn TaskBody> {
    let log = Arc::clone(log);
    let name = name.to_string();
    Arc::new(FnBody::new(move |_ctx| {
        let log = Arc::clone(&log);
        let name = name.clone();
        async move {
            log.lock().unwrap().push(format!("start:{name}"));
            anyhow::bail!("{name} exploded")
        }
    }))
}

/// A body that panics.
pub fn panicking_body() -> Arc<dyn TaskBody> {
    Arc::new(FnBody::new(|_ctx| async move {
        if true {
            panic!("body panicked");
        }
        Ok(())
    }))
}

/// Index of `entry` in the log; panics if absent.
pub fn position(log: &EventLog, entry: &str) -> usize {
    log.lock()
        .unwrap()
        .iter()
        .position(|e| e == entry)
        .unwrap_or_else(|| panic!("'{entry}' not in log"))
}
