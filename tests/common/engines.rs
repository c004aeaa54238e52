//! Execution engine doubles for driving submission-failure paths.

use futures::future::BoxFuture;
use managed_executor::{EngineError, EngineTask, ExecutionEngine, TokioEngine};
use std::sync::atomic::{AtomicU64, Ordering};

/// Refuses every spawn, as an engine at capacity would.
pub struct RefusingEngine;

impl ExecutionEngine for RefusingEngine {
    fn spawn(&self, _fut: BoxFuture<'static, ()>) -> Result<EngineTask, EngineError> {
        Err(EngineError::SpawnRejected("engine at capacity".to_string()))
    }
}

/// Accepts a fixed number of spawns, then refuses. Used to fail the re-arm
/// of a recurrence after its first runs have already succeeded.
pub struct CappedEngine {
    delegate: TokioEngine,
    remaining: AtomicU64,
}

impl CappedEngine {
    /// Must be called from within a tokio runtime.
    pub fn new(capacity: u64) -> Result<Self, EngineError> {
        Ok(Self {
            delegate: TokioEngine::current()?,
            remaining: AtomicU64::new(capacity),
        })
    }
}

impl ExecutionEngine for CappedEngine {
    fn spawn(&self, fut: BoxFuture<'static, ()>) -> Result<EngineTask, EngineError> {
        let budget = self
            .remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if budget.is_err() {
            return Err(EngineError::SpawnRejected(
                "spawn budget exhausted".to_string(),
            ));
        }
        self.delegate.spawn(fut)
    }
}
