//! # Execution Engine Seam
//!
//! The coordination layer never runs work itself; it hands fully-prepared run
//! futures to an execution engine. Facades hold the engine behind a trait
//! object so the engine can be swapped (production runtime, test double)
//! without touching the lifecycle protocol. Delay and period composition stay
//! on the coordination side, which keeps scheduled waits abortable through
//! the task abort hook.

use futures::future::BoxFuture;
use std::fmt;
use thiserror::Error;
use tokio::runtime::Handle;

/// Errors surfaced by an execution engine before any work has run.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("Engine rejected spawn: {0}")]
    SpawnRejected(String),
    #[error("No async runtime available: {0}")]
    NoRuntime(String),
}

/// A unit of work the engine has accepted. Aborting drops the run future at
/// its next suspension point; the abort hook is consumed on first use.
pub struct EngineTask {
    abort: Option<Box<dyn FnOnce() + Send>>,
}

impl EngineTask {
    pub fn new(abort: impl FnOnce() + Send + 'static) -> Self {
        Self {
            abort: Some(Box::new(abort)),
        }
    }

    /// Request that the engine stop driving this task.
    pub fn abort(mut self) {
        if let Some(abort) = self.abort.take() {
            abort();
        }
    }
}

impl fmt::Debug for EngineTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineTask")
            .field("abortable", &self.abort.is_some())
            .finish()
    }
}

/// Asynchronous execution engine accepting prepared run futures.
pub trait ExecutionEngine: Send + Sync {
    /// Hand a run future to the engine. Returns an abortable task on
    /// acceptance; any failure here means the work never started.
    fn spawn(&self, fut: BoxFuture<'static, ()>) -> Result<EngineTask, EngineError>;
}

/// Engine adapter over a tokio runtime handle.
#[derive(Debug, Clone)]
pub struct TokioEngine {
    handle: Handle,
}

impl TokioEngine {
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Bind to the runtime of the calling context.
    pub fn current() -> Result<Self, EngineError> {
        Handle::try_current()
            .map(Self::new)
            .map_err(|e| EngineError::NoRuntime(e.to_string()))
    }
}

impl ExecutionEngine for TokioEngine {
    fn spawn(&self, fut: BoxFuture<'static, ()>) -> Result<EngineTask, EngineError> {
        let join = self.handle.spawn(fut);
        Ok(EngineTask::new(move || join.abort()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_tokio_engine_runs_spawned_future() {
        let engine = TokioEngine::current().unwrap();
        let ran = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&ran);

        let task = engine
            .spawn(async move { flag.store(true, Ordering::SeqCst) }.boxed())
            .unwrap();

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(ran.load(Ordering::SeqCst));
        drop(task);
    }

    #[tokio::test]
    async fn test_abort_stops_parked_future() {
        let engine = TokioEngine::current().unwrap();
        let ran = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&ran);

        let task = engine
            .spawn(
                async move {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    flag.store(true, Ordering::SeqCst);
                }
                .boxed(),
            )
            .unwrap();

        task.abort();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!ran.load(Ordering::SeqCst));
    }
}
