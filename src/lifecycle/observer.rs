//! # Lifecycle Observers
//!
//! Optional caller-supplied callbacks notified as a task moves through its
//! lifecycle: submitted, starting, aborted, done. Observer failures are a
//! fact of life; every callback is panic-isolated and logged so a misbehaving
//! observer can never corrupt the coordination protocol or change a task's
//! outcome.

use crate::context::ContextScope;
use crate::error::TaskError;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use tracing::warn;
use uuid::Uuid;

/// Object-safe control view of one asynchronous invocation, handed to
/// observers and kept by the facade's outstanding-handle set.
pub trait TaskControl: Send + Sync {
    /// Attempt to cancel the invocation. Returns whether this call was the
    /// one that actually cancelled it.
    fn cancel(&self, interrupt: bool) -> bool;
    fn is_cancelled(&self) -> bool;
    fn is_done(&self) -> bool;
    /// Stable identity string for diagnostics and logging.
    fn identity(&self) -> &str;
    fn id(&self) -> Uuid;
}

/// Caller-supplied lifecycle callback set.
///
/// `task_aborted` fires only for execution errors; cancellations and skipped
/// recurring runs are reported through `task_done` alone. All callbacks
/// receive the owning facade's name and a control view of the invocation.
pub trait LifecycleObserver: Send + Sync {
    fn task_submitted(&self, _executor: &str, _task: &dyn TaskControl) {}
    fn task_starting(&self, _executor: &str, _task: &dyn TaskControl) {}
    fn task_aborted(&self, _executor: &str, _task: &dyn TaskControl, _error: &TaskError) {}
    fn task_done(&self, _executor: &str, _task: &dyn TaskControl, _error: Option<&TaskError>) {}
}

/// Extract a printable message from a caught panic payload.
pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "Unknown panic".to_string()
    }
}

/// Invoke one observer callback with panic isolation, optionally inside the
/// task's captured context scope.
pub(crate) fn notify_observer<F>(
    scope: Option<&dyn ContextScope>,
    executor: &str,
    identity: &str,
    stage: &'static str,
    callback: F,
) where
    F: FnOnce(),
{
    let mut callback = Some(callback);
    let mut invoke = || {
        if let Some(callback) = callback.take() {
            callback();
        }
    };

    let outcome = match scope {
        Some(scope) => std::panic::catch_unwind(AssertUnwindSafe(|| scope.run(&mut invoke))),
        None => std::panic::catch_unwind(AssertUnwindSafe(&mut invoke)),
    };

    if let Err(panic) = outcome {
        warn!(
            executor = %executor,
            task = %identity,
            stage = %stage,
            panic = %panic_message(&panic),
            "⚠️ Lifecycle observer panicked; continuing"
        );
    }
}
