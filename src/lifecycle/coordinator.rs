//! # Task Lifecycle Coordinator
//!
//! Wraps one work item and turns "this is about to run under an execution
//! engine" into a race-free sequence of lifecycle notifications. Submission,
//! run start, normal completion and cancellation may interleave from
//! different threads; the callback gate arbitrates them so that exactly one
//! path delivers the terminal `done` notification per invocation.
//!
//! The protocol rules:
//! - every gate-acquiring step re-checks cancellation after releasing, and a
//!   detected cancel independently drives the cancellation path, which wins
//!   the (now free) gate exactly once;
//! - terminal transitions leave the gate held so late paths become inert;
//! - a periodic invocation's successful completion releases the gate and
//!   re-arms the submitted notification for the next cycle, the only
//!   legitimate reset;
//! - the terminal outcome is published to the handle's write-once cell
//!   before gate arbitration, so waiters and callbacks always agree.

use crate::context::{run_scoped, ContextScope};
use crate::error::{TaskError, TaskResult};
use crate::executor::managed::ExecutorShared;
use crate::lifecycle::gate::CallbackGate;
use crate::lifecycle::handle::{HandleCore, TaskHandle};
use crate::lifecycle::observer::{notify_observer, panic_message, LifecycleObserver, TaskControl};
use crate::lifecycle::task::{ManagedTask, TaskBody};
use parking_lot::{Mutex, RwLock};
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Weak};
use tracing::{debug, error};

/// Coordinates the lifecycle of one work item across all of its invocations.
///
/// Periodic and recurring tasks reuse a single coordinator; the bound handle
/// core (one per logical invocation for one-shot and periodic tasks, one per
/// iteration for trigger-driven tasks) and the gate are the only state that
/// changes between cycles.
pub(crate) struct TaskCoordinator<T> {
    identity: String,
    executor: String,
    gate: CallbackGate,
    body: Mutex<TaskBody<T>>,
    scope: Arc<dyn ContextScope>,
    observer: Option<Arc<dyn LifecycleObserver>>,
    contextual_callbacks: bool,
    periodic: bool,
    shared: Weak<ExecutorShared>,
    core: RwLock<Arc<HandleCore<T>>>,
}

impl<T: Send + Sync + 'static> TaskCoordinator<T> {
    pub(crate) fn new(
        task: ManagedTask<T>,
        identity: String,
        executor: String,
        scope: Arc<dyn ContextScope>,
        periodic: bool,
        shared: Weak<ExecutorShared>,
    ) -> Arc<Self> {
        Arc::new(Self {
            core: RwLock::new(Arc::new(HandleCore::new(identity.clone()))),
            identity,
            executor,
            gate: CallbackGate::new(),
            body: Mutex::new(task.body),
            scope,
            observer: task.observer,
            contextual_callbacks: task.contextual_callbacks,
            periodic,
            shared,
        })
    }

    pub(crate) fn core(&self) -> Arc<HandleCore<T>> {
        Arc::clone(&self.core.read())
    }

    pub(crate) fn identity(&self) -> &str {
        &self.identity
    }

    pub(crate) fn scope(&self) -> &Arc<dyn ContextScope> {
        &self.scope
    }

    /// Caller-facing handle bound to the current invocation.
    pub(crate) fn handle(self: &Arc<Self>) -> TaskHandle<T> {
        TaskHandle::new(self.core(), Arc::clone(self))
    }

    /// True when the owning facade has been shut down or dropped.
    pub(crate) fn facade_shut_down(&self) -> bool {
        match self.shared.upgrade() {
            Some(shared) => shared.is_shutdown(),
            None => true,
        }
    }

    /// Bind a fresh invocation core and free the gate for the next cycle.
    /// Only the recurrence driver calls this, between iterations.
    pub(crate) fn rebind(&self, core: Arc<HandleCore<T>>) {
        *self.core.write() = core;
        self.gate.release();
    }

    /// Lifecycle entry: the invocation has been handed to the engine.
    pub(crate) fn on_submitted(self: &Arc<Self>) {
        if self.gate.acquire() {
            let core = self.core();
            if let Some(shared) = self.shared.upgrade() {
                shared.track(core.id(), Arc::new(self.handle()));
            }
            self.observe("submitted", |observer, executor, task| {
                observer.task_submitted(executor, task);
            });
            self.gate.release();
            debug!(
                executor = %self.executor,
                task = %self.identity,
                invocation_id = %core.id(),
                "Task submitted"
            );
        }
        // A cancel that lost the gate above is driven to completion here,
        // now that the gate is free again.
        if self.core().is_cancelled() {
            self.on_cancelled();
        }
    }

    /// Lifecycle entry: the engine failed before the invocation could run.
    pub(crate) fn on_submit_failed(self: &Arc<Self>, error: TaskError) {
        if self.gate.acquire() {
            self.core().try_complete(Err(error.clone()));
            self.done(Some(&error));
            // gate stays held: this invocation is finished
        }
    }

    /// Lifecycle entry: the run wrapper is about to invoke the body.
    pub(crate) fn before_run(self: &Arc<Self>) {
        if self.gate.acquire() {
            self.observe("starting", |observer, executor, task| {
                observer.task_starting(executor, task);
            });
            self.gate.release();
        }
        if self.core().is_cancelled() {
            self.on_cancelled();
        }
    }

    /// Lifecycle exit: the body finished (or was skipped) with `outcome`.
    pub(crate) fn after_run(self: &Arc<Self>, outcome: TaskResult<T>) {
        let core = self.core();

        // Publish the terminal outcome before arbitrating callbacks so a
        // racing cancel and this completion cannot disagree with `get()`.
        // Periodic success never completes the cell; only an error or a
        // cancellation resolves a periodic handle.
        let error = match outcome {
            Ok(value) => {
                if !self.periodic {
                    core.try_complete(Ok(value));
                }
                None
            }
            Err(error) => {
                core.try_complete(Err(error.clone()));
                Some(error)
            }
        };

        if !self.gate.acquire() {
            return;
        }
        if core.is_cancelled() {
            self.done(Some(&TaskError::Cancelled));
            return;
        }
        match error {
            Some(error) => self.done(Some(&error)),
            None if self.periodic => {
                self.done(None);
                self.gate.release();
                self.on_submitted();
            }
            None => self.done(None),
        }
    }

    /// Lifecycle entry: a cancel won the outcome cell and must now deliver
    /// the terminal notification, unless another path already has.
    pub(crate) fn on_cancelled(self: &Arc<Self>) {
        if self.gate.acquire() {
            self.done(Some(&TaskError::Cancelled));
        }
    }

    /// Terminal bookkeeping: untrack the invocation, then notify the
    /// observer. Execution errors get an abort notification first;
    /// cancellations and skips are reported through `done` alone.
    fn done(self: &Arc<Self>, error: Option<&TaskError>) {
        let core = self.core();
        if let Some(shared) = self.shared.upgrade() {
            shared.finish(core.id(), error);
        }
        if let Some(error) = error.filter(|e| e.is_abort()) {
            self.observe("aborted", |observer, executor, task| {
                observer.task_aborted(executor, task, error);
            });
        }
        self.observe("done", |observer, executor, task| {
            observer.task_done(executor, task, error);
        });
        debug!(
            executor = %self.executor,
            task = %self.identity,
            invocation_id = %core.id(),
            outcome = %error.map(|e| e.to_string()).unwrap_or_else(|| "success".to_string()),
            "Task lifecycle complete"
        );
    }

    /// Run the body inside the captured context, mapping panics to aborts.
    pub(crate) fn invoke_body(&self) -> TaskResult<T> {
        let scope = Arc::clone(&self.scope);
        let mut body = self.body.lock();
        let result = std::panic::catch_unwind(AssertUnwindSafe(|| {
            run_scoped(scope.as_ref(), || body.invoke())
        }));
        match result {
            Ok(outcome) => outcome,
            Err(panic) => {
                let message = panic_message(&*panic);
                error!(
                    executor = %self.executor,
                    task = %self.identity,
                    panic = %message,
                    "💥 Work item panicked"
                );
                Err(TaskError::Aborted(format!("work item panicked: {message}")))
            }
        }
    }

    /// One full run cycle: bracket the body with the before/after lifecycle
    /// steps, bailing out early when the invocation is already terminal.
    pub(crate) fn run_once(self: &Arc<Self>) {
        let core = self.core();
        if core.is_done() {
            return;
        }
        self.before_run();
        if core.is_done() {
            return;
        }
        let outcome = self.invoke_body();
        self.after_run(outcome);
    }

    fn observe<F>(self: &Arc<Self>, stage: &'static str, notify: F)
    where
        F: FnOnce(&dyn LifecycleObserver, &str, &dyn TaskControl),
    {
        if let Some(observer) = self.observer.as_ref() {
            let view = self.handle();
            let scope = if self.contextual_callbacks {
                Some(Arc::clone(&self.scope))
            } else {
                None
            };
            notify_observer(
                scope.as_deref(),
                &self.executor,
                &self.identity,
                stage,
                || notify(observer.as_ref(), &self.executor, &view),
            );
        }
    }
}
