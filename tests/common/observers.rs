//! Lifecycle observer doubles shared across integration tests.

use managed_executor::{LifecycleObserver, TaskControl, TaskError};
use parking_lot::Mutex;
use std::sync::Arc;

/// Records every lifecycle notification in arrival order.
#[derive(Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<String>>,
}

impl RecordingObserver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().clone()
    }

    /// How many recorded events start with `stage`.
    pub fn count(&self, stage: &str) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|event| event.starts_with(stage))
            .count()
    }

    /// Block-free poll helper: the terminal notifications seen so far.
    pub fn terminal_count(&self) -> usize {
        self.count("done")
    }
}

impl LifecycleObserver for RecordingObserver {
    fn task_submitted(&self, _executor: &str, _task: &dyn TaskControl) {
        self.events.lock().push("submitted".to_string());
    }

    fn task_starting(&self, _executor: &str, _task: &dyn TaskControl) {
        self.events.lock().push("starting".to_string());
    }

    fn task_aborted(&self, _executor: &str, _task: &dyn TaskControl, error: &TaskError) {
        self.events.lock().push(format!("aborted:{error}"));
    }

    fn task_done(&self, _executor: &str, _task: &dyn TaskControl, error: Option<&TaskError>) {
        let label = match error {
            Some(error) => format!("done:{error}"),
            None => "done".to_string(),
        };
        self.events.lock().push(label);
    }
}

/// Panics in every callback; tasks observed by it must still complete
/// normally.
pub struct PanickingObserver;

impl LifecycleObserver for PanickingObserver {
    fn task_submitted(&self, _executor: &str, _task: &dyn TaskControl) {
        panic!("observer bug at submission");
    }

    fn task_starting(&self, _executor: &str, _task: &dyn TaskControl) {
        panic!("observer bug at start");
    }

    fn task_aborted(&self, _executor: &str, _task: &dyn TaskControl, _error: &TaskError) {
        panic!("observer bug at abort");
    }

    fn task_done(&self, _executor: &str, _task: &dyn TaskControl, _error: Option<&TaskError>) {
        panic!("observer bug at completion");
    }
}
