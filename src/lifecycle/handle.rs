//! # Invocation Handles
//!
//! A [`TaskHandle`] represents one asynchronous invocation: callers use it to
//! await the outcome, query terminal state, and cancel. The terminal outcome
//! lives in a write-once cell; whichever path writes it first (normal
//! completion, execution error, or cancellation) is the truth every waiter
//! and every lifecycle callback agrees on.

use crate::engine::EngineTask;
use crate::error::{TaskError, TaskResult};
use crate::lifecycle::coordinator::TaskCoordinator;
use crate::lifecycle::observer::TaskControl;
use parking_lot::Mutex;
use std::fmt;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::sync::Notify;
use tracing::debug;
use uuid::Uuid;

/// Engine attachment states. Cancellation can arrive before the engine has
/// produced a task; the pending-abort state carries that request forward to
/// attachment time.
enum EngineSlot {
    Empty,
    PendingAbort,
    Attached(EngineTask),
    Consumed,
}

/// Shared state of one invocation.
pub(crate) struct HandleCore<T> {
    id: Uuid,
    identity: String,
    outcome: OnceLock<TaskResult<T>>,
    done: Notify,
    engine_task: Mutex<EngineSlot>,
}

impl<T> HandleCore<T> {
    pub(crate) fn new(identity: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            identity,
            outcome: OnceLock::new(),
            done: Notify::new(),
            engine_task: Mutex::new(EngineSlot::Empty),
        }
    }

    pub(crate) fn id(&self) -> Uuid {
        self.id
    }

    pub(crate) fn identity(&self) -> &str {
        &self.identity
    }

    /// First writer wins; losers leave the recorded outcome untouched.
    pub(crate) fn try_complete(&self, outcome: TaskResult<T>) -> bool {
        let won = self.outcome.set(outcome).is_ok();
        if won {
            self.done.notify_waiters();
        }
        won
    }

    pub(crate) fn outcome(&self) -> Option<&TaskResult<T>> {
        self.outcome.get()
    }

    pub(crate) fn is_done(&self) -> bool {
        self.outcome.get().is_some()
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        matches!(self.outcome.get(), Some(Err(TaskError::Cancelled)))
    }

    /// Await the terminal outcome. Waiters register interest before
    /// re-checking the cell so a completion landing between check and sleep
    /// cannot be missed.
    pub(crate) async fn wait(&self) -> &TaskResult<T> {
        loop {
            if let Some(outcome) = self.outcome.get() {
                return outcome;
            }
            let notified = self.done.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if let Some(outcome) = self.outcome.get() {
                return outcome;
            }
            notified.await;
        }
    }

    /// Record the engine task backing this invocation, honoring a
    /// cancellation that arrived before the engine produced it.
    pub(crate) fn attach_engine(&self, task: EngineTask) {
        let mut slot = self.engine_task.lock();
        match std::mem::replace(&mut *slot, EngineSlot::Consumed) {
            EngineSlot::Empty => *slot = EngineSlot::Attached(task),
            EngineSlot::PendingAbort | EngineSlot::Consumed => task.abort(),
            EngineSlot::Attached(_) => *slot = EngineSlot::Attached(task),
        }
    }

    /// Stop the engine from driving this invocation any further.
    pub(crate) fn abort_engine(&self) {
        let mut slot = self.engine_task.lock();
        match std::mem::replace(&mut *slot, EngineSlot::Consumed) {
            EngineSlot::Attached(task) => task.abort(),
            EngineSlot::Empty | EngineSlot::PendingAbort => *slot = EngineSlot::PendingAbort,
            EngineSlot::Consumed => {}
        }
    }
}

/// Caller-facing handle for one managed invocation.
pub struct TaskHandle<T> {
    core: Arc<HandleCore<T>>,
    coordinator: Arc<TaskCoordinator<T>>,
}

impl<T> Clone for TaskHandle<T> {
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
            coordinator: Arc::clone(&self.coordinator),
        }
    }
}

impl<T: Send + Sync + 'static> TaskHandle<T> {
    pub(crate) fn new(core: Arc<HandleCore<T>>, coordinator: Arc<TaskCoordinator<T>>) -> Self {
        Self { core, coordinator }
    }

    pub(crate) fn core(&self) -> &Arc<HandleCore<T>> {
        &self.core
    }

    pub(crate) fn coordinator(&self) -> &Arc<TaskCoordinator<T>> {
        &self.coordinator
    }

    /// Unique id of this invocation.
    pub fn id(&self) -> Uuid {
        self.core.id
    }

    /// Identity name reported to observers and diagnostics.
    pub fn identity(&self) -> &str {
        &self.core.identity
    }

    /// Cancel this invocation. Returns true only for the call that actually
    /// transitioned it to cancelled; a cancel racing a completed task (or a
    /// second cancel) truthfully returns false.
    ///
    /// The engine task is always aborted on a won cancel. `interrupt` records
    /// the caller's urgency; an in-progress body cannot be pre-empted
    /// mid-call, so interruption is best effort either way.
    pub fn cancel(&self, interrupt: bool) -> bool {
        let won = self.core.try_complete(Err(TaskError::Cancelled));
        if won {
            debug!(
                task = %self.core.identity,
                invocation_id = %self.core.id,
                interrupt,
                "Task cancelled"
            );
            self.core.abort_engine();
            self.coordinator.on_cancelled();
        }
        won
    }

    pub fn is_cancelled(&self) -> bool {
        self.core.is_cancelled()
    }

    pub fn is_done(&self) -> bool {
        self.core.is_done()
    }
}

impl<T: Clone + Send + Sync + 'static> TaskHandle<T> {
    /// Await the terminal outcome.
    pub async fn get(&self) -> TaskResult<T> {
        self.core.wait().await.clone()
    }

    /// Await the terminal outcome for at most `timeout`.
    pub async fn get_timeout(&self, timeout: Duration) -> TaskResult<T> {
        match tokio::time::timeout(timeout, self.core.wait()).await {
            Ok(outcome) => outcome.clone(),
            Err(_) => Err(TaskError::Timeout),
        }
    }
}

impl<T: Send + Sync + 'static> TaskControl for TaskHandle<T> {
    fn cancel(&self, interrupt: bool) -> bool {
        TaskHandle::cancel(self, interrupt)
    }

    fn is_cancelled(&self) -> bool {
        TaskHandle::is_cancelled(self)
    }

    fn is_done(&self) -> bool {
        TaskHandle::is_done(self)
    }

    fn identity(&self) -> &str {
        TaskHandle::identity(self)
    }

    fn id(&self) -> Uuid {
        TaskHandle::id(self)
    }
}

impl<T> fmt::Debug for TaskHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle")
            .field("id", &self.core.id)
            .field("identity", &self.core.identity)
            .field("done", &self.core.is_done())
            .finish()
    }
}
