//! # Recurrence Driver
//!
//! Owns one logical recurring task across all of its one-shot iterations.
//! Each iteration gets a fresh invocation core bound into the shared
//! coordinator; between iterations the driver consults the caller's
//! [`Trigger`] for the next run time (ending the recurrence when the policy
//! returns none) and for per-run skip decisions. Policy calls run inside the
//! submitter's captured context, like the work item body itself.
//!
//! The driver's done flag is one-shot: a cancel, a policy ending the
//! recurrence, a policy panic, or a failed re-arm all park the driver
//! permanently. `run_done` is only ever invoked from the completion path of
//! the current iteration, so the current-handle slot has a single logical
//! writer plus external cancel, serialized by the state mutex.

use crate::context::run_scoped;
use crate::engine::ExecutionEngine;
use crate::error::{TaskError, TaskResult};
use crate::executor::managed::ManagedExecutor;
use crate::lifecycle::coordinator::TaskCoordinator;
use crate::lifecycle::handle::{HandleCore, TaskHandle};
use crate::lifecycle::observer::panic_message;
use crate::lifecycle::task::ManagedTask;
use crate::scheduling::trigger::{LastExecution, Trigger};
use chrono::{DateTime, Utc};
use futures::FutureExt;
use parking_lot::Mutex;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{debug, error, info, instrument, warn};

struct DriverState<T> {
    current: Option<TaskHandle<T>>,
    next_run: Option<DateTime<Utc>>,
}

struct RecurringInner<T> {
    identity: String,
    original_start: DateTime<Utc>,
    trigger: Arc<dyn Trigger>,
    coordinator: Arc<TaskCoordinator<T>>,
    engine: Arc<dyn ExecutionEngine>,
    done: AtomicBool,
    cancelled: AtomicBool,
    iterations: AtomicU64,
    state: Mutex<DriverState<T>>,
    armed: Notify,
    last_execution: Mutex<Option<LastExecution>>,
}

impl<T: Clone + Send + Sync + 'static> RecurringInner<T> {
    /// Run the policy's next-run computation inside the captured context,
    /// surfacing a panic as an error message instead of unwinding.
    fn compute_next(
        &self,
        last: Option<&LastExecution>,
    ) -> Result<Option<DateTime<Utc>>, String> {
        let scope = Arc::clone(self.coordinator.scope());
        std::panic::catch_unwind(AssertUnwindSafe(|| {
            run_scoped(scope.as_ref(), || {
                self.trigger.next_run_time(last, self.original_start)
            })
        }))
        .map_err(|panic| panic_message(&panic))
    }

    /// A panicking skip policy suppresses the run rather than killing the
    /// recurrence.
    fn compute_skip(&self, last: Option<&LastExecution>, scheduled_run: DateTime<Utc>) -> bool {
        let scope = Arc::clone(self.coordinator.scope());
        let decision = std::panic::catch_unwind(AssertUnwindSafe(|| {
            run_scoped(scope.as_ref(), || {
                self.trigger.skip_run(last, scheduled_run)
            })
        }));
        match decision {
            Ok(skip) => skip,
            Err(panic) => {
                warn!(
                    task = %self.identity,
                    panic = %panic_message(&panic),
                    "Skip policy panicked; suppressing this run"
                );
                true
            }
        }
    }

    /// Bind a fresh invocation core, fire the submitted notification, then
    /// hand a delayed run future to the engine.
    fn arm(self: &Arc<Self>, scheduled_start: DateTime<Utc>) {
        let handle = {
            let mut state = self.state.lock();
            if self.done.load(Ordering::Acquire) {
                return;
            }
            if self.coordinator.facade_shut_down() {
                drop(state);
                warn!(
                    task = %self.identity,
                    "Executor shut down; recurrence will not be re-armed"
                );
                self.park();
                return;
            }
            let core = Arc::new(HandleCore::new(self.identity.clone()));
            self.coordinator.rebind(Arc::clone(&core));
            let handle = TaskHandle::new(core, Arc::clone(&self.coordinator));
            state.current = Some(handle.clone());
            state.next_run = Some(scheduled_start);
            handle
        };
        self.armed.notify_waiters();
        self.coordinator.on_submitted();

        let delay = (scheduled_start - Utc::now())
            .to_std()
            .unwrap_or(Duration::ZERO);
        let driver = Arc::clone(self);
        let fut = async move {
            tokio::time::sleep(delay).await;
            driver.run_iteration(scheduled_start);
        }
        .boxed();
        match self.engine.spawn(fut) {
            Ok(task) => {
                handle.core().attach_engine(task);
                // Close the race with a teardown that began mid-arm
                if self.coordinator.facade_shut_down() {
                    handle.cancel(false);
                    self.park_cancelled();
                }
            }
            Err(engine_error) => {
                let failure = TaskError::SubmitFailed(engine_error.to_string());
                self.coordinator.on_submit_failed(failure);
                if self.iterations.load(Ordering::Relaxed) > 0 {
                    warn!(
                        task = %self.identity,
                        error = %engine_error,
                        "Arming the next recurrence run failed; no further runs will be scheduled"
                    );
                } else {
                    error!(
                        task = %self.identity,
                        error = %engine_error,
                        "Recurring task never ran: first submission failed"
                    );
                }
                self.park();
            }
        }
    }

    /// One iteration: skip decision, lifecycle-bracketed run, then hand the
    /// completed run record back to the policy for re-arming.
    fn run_iteration(self: &Arc<Self>, scheduled_start: DateTime<Utc>) {
        let core = self.coordinator.core();
        if core.is_done() {
            if core.is_cancelled() {
                self.park_cancelled();
            }
            return;
        }

        let last = self.last_execution.lock().clone();
        let skip = self.compute_skip(last.as_ref(), scheduled_start);

        self.coordinator.before_run();
        if core.is_done() {
            if core.is_cancelled() {
                self.park_cancelled();
            }
            return;
        }

        let mut record = LastExecution::new(self.identity.clone(), scheduled_start);
        let outcome = if skip {
            record.mark_skipped();
            Err(TaskError::Skipped)
        } else {
            let run_start = Utc::now();
            let outcome = self.coordinator.invoke_body();
            record.record_run(run_start, Utc::now());
            if let Ok(value) = &outcome {
                record.record_result(Arc::new(value.clone()));
            }
            outcome
        };
        self.coordinator.after_run(outcome);
        self.iterations.fetch_add(1, Ordering::Relaxed);

        // A cancelled iteration is terminal for the whole recurrence and
        // its record is never fed back into the policy
        if core.is_cancelled() {
            self.park_cancelled();
            return;
        }
        *self.last_execution.lock() = Some(record.clone());
        self.run_done(record);
    }

    fn run_done(self: &Arc<Self>, record: LastExecution) {
        if self.done.load(Ordering::Acquire) {
            return;
        }
        match self.compute_next(Some(&record)) {
            Ok(Some(next)) => self.arm(next),
            Ok(None) => {
                info!(
                    task = %self.identity,
                    iterations = self.iterations.load(Ordering::Relaxed),
                    "Recurrence complete: policy returned no next run time"
                );
                self.park();
            }
            Err(panic) => {
                warn!(
                    task = %self.identity,
                    panic = %panic,
                    "Recurrence policy panicked after completed runs; no further runs will be scheduled"
                );
                self.park();
            }
        }
    }

    fn park(&self) {
        let _ = self
            .done
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire);
        self.armed.notify_waiters();
    }

    fn park_cancelled(&self) {
        self.cancelled.store(true, Ordering::Release);
        self.park();
    }
}

/// Caller-facing handle for one logical recurring task.
///
/// Status queries reflect the recurrence as a whole; `get` delegates to the
/// current iteration once one has been armed.
pub struct RecurringTaskHandle<T> {
    inner: Arc<RecurringInner<T>>,
}

impl<T> Clone for RecurringTaskHandle<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> RecurringTaskHandle<T> {
    #[instrument(skip(executor, task, trigger), fields(executor = %executor.name()))]
    pub(crate) fn start(
        executor: &ManagedExecutor,
        task: ManagedTask<T>,
        trigger: Arc<dyn Trigger>,
    ) -> TaskResult<Self> {
        let shared = executor.shared();
        if shared.is_shutdown() {
            shared.record_rejection();
            return Err(TaskError::Rejected(format!(
                "executor '{}' is shut down",
                shared.name()
            )));
        }
        let identity = task
            .identity
            .clone()
            .unwrap_or_else(|| shared.next_task_name());
        let scope = executor.context().capture();
        let coordinator = TaskCoordinator::new(
            task,
            identity.clone(),
            shared.name().to_string(),
            scope,
            false,
            Arc::downgrade(shared),
        );
        let inner = Arc::new(RecurringInner {
            identity,
            original_start: Utc::now(),
            trigger,
            coordinator,
            engine: Arc::clone(executor.engine()),
            done: AtomicBool::new(false),
            cancelled: AtomicBool::new(false),
            iterations: AtomicU64::new(0),
            state: Mutex::new(DriverState {
                current: None,
                next_run: None,
            }),
            armed: Notify::new(),
            last_execution: Mutex::new(None),
        });
        match inner.compute_next(None) {
            Ok(Some(first)) => inner.arm(first),
            Ok(None) => {
                info!(
                    task = %inner.identity,
                    "Recurring task never scheduled: policy returned no first run time"
                );
                inner.park();
            }
            Err(panic) => {
                error!(
                    task = %inner.identity,
                    panic = %panic,
                    "Recurring task never scheduled: recurrence policy panicked"
                );
                inner.park();
            }
        }
        Ok(Self { inner })
    }

    /// Identity name reported to observers and diagnostics.
    pub fn identity(&self) -> &str {
        &self.inner.identity
    }

    /// The recurrence's fixed original scheduled start, fed to every
    /// next-run computation.
    pub fn original_scheduled_start(&self) -> DateTime<Utc> {
        self.inner.original_start
    }

    /// How many iterations have run (including skipped ones).
    pub fn iterations(&self) -> u64 {
        self.inner.iterations.load(Ordering::Relaxed)
    }

    /// True once no further runs will ever be scheduled.
    pub fn is_done(&self) -> bool {
        self.inner.done.load(Ordering::Acquire)
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }

    /// Delay until the current iteration's scheduled start; `None` before
    /// the first iteration is armed, floored at zero once the start has
    /// passed.
    pub fn current_delay(&self) -> Option<Duration> {
        let state = self.inner.state.lock();
        let next = state.next_run?;
        Some((next - Utc::now()).to_std().unwrap_or(Duration::ZERO))
    }

    /// Stop the recurrence. One-shot: only the first call wins the done
    /// flag; the cancel is then forwarded to the current iteration's handle,
    /// whose own result is returned. Re-arming stops either way.
    pub fn cancel(&self, interrupt: bool) -> bool {
        if self
            .inner
            .done
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        self.inner.cancelled.store(true, Ordering::Release);
        self.inner.armed.notify_waiters();
        debug!(task = %self.inner.identity, interrupt, "Recurring task cancelled");
        let current = self.inner.state.lock().current.clone();
        match current {
            Some(handle) => handle.cancel(interrupt),
            None => true,
        }
    }

    /// Await the current iteration's outcome, waiting for the first
    /// iteration to be armed when none is yet. A recurrence that parked
    /// without ever arming reports that instead of blocking forever.
    pub async fn get(&self) -> TaskResult<T> {
        loop {
            // Clone out of the lock before awaiting: the guard must never
            // be held across a suspension point, or the driver's own
            // re-arm path would block on it
            let current = self.inner.state.lock().current.clone();
            if let Some(handle) = current {
                return handle.get().await;
            }
            if self.inner.done.load(Ordering::Acquire) {
                return Err(TaskError::NeverScheduled);
            }
            let notified = self.inner.armed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            let current = self.inner.state.lock().current.clone();
            if let Some(handle) = current {
                return handle.get().await;
            }
            if self.inner.done.load(Ordering::Acquire) {
                return Err(TaskError::NeverScheduled);
            }
            notified.await;
        }
    }

    /// `get` with a bound on the overall wait.
    pub async fn get_timeout(&self, timeout: Duration) -> TaskResult<T> {
        match tokio::time::timeout(timeout, self.get()).await {
            Ok(outcome) => outcome,
            Err(_) => Err(TaskError::Timeout),
        }
    }
}

impl<T> fmt::Debug for RecurringTaskHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecurringTaskHandle")
            .field("identity", &self.inner.identity)
            .field("iterations", &self.inner.iterations.load(Ordering::Relaxed))
            .field("done", &self.inner.done.load(Ordering::Acquire))
            .field("cancelled", &self.inner.cancelled.load(Ordering::Acquire))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ManagedExecutorConfig;
    use crate::scheduling::trigger::IntervalTrigger;
    use std::sync::atomic::AtomicU32;

    fn executor(name: &str) -> ManagedExecutor {
        ManagedExecutor::tokio(ManagedExecutorConfig::named(name)).unwrap()
    }

    async fn wait_until_done<T: Clone + Send + Sync + 'static>(handle: &RecurringTaskHandle<T>) {
        for _ in 0..300 {
            if handle.is_done() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("recurrence did not finish in time");
    }

    /// skip_run suppresses the given one-based iteration numbers.
    struct SkippingTrigger {
        period: Duration,
        limit: u64,
        calls: AtomicU64,
        skip: Vec<u64>,
    }

    impl Trigger for SkippingTrigger {
        fn next_run_time(
            &self,
            last: Option<&LastExecution>,
            original: DateTime<Utc>,
        ) -> Option<DateTime<Utc>> {
            match last {
                None => Some(original),
                Some(_) => {
                    let completed = self.calls.fetch_add(1, Ordering::Relaxed) + 1;
                    if completed >= self.limit {
                        return None;
                    }
                    Some(Utc::now() + chrono::Duration::from_std(self.period).ok()?)
                }
            }
        }

        fn skip_run(&self, _last: Option<&LastExecution>, _scheduled: DateTime<Utc>) -> bool {
            let iteration = self.calls.load(Ordering::Relaxed) + 1;
            self.skip.contains(&iteration)
        }
    }

    #[tokio::test]
    async fn test_interval_recurrence_runs_to_limit() {
        let executor = executor("recur-limit");
        let counter = Arc::new(AtomicU32::new(0));
        let body_counter = Arc::clone(&counter);
        let trigger = Arc::new(IntervalTrigger::every(Duration::from_millis(10)).with_limit(3));

        let handle = RecurringTaskHandle::start(
            &executor,
            ManagedTask::repeating(move || {
                body_counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }),
            trigger,
        )
        .unwrap();

        wait_until_done(&handle).await;
        assert_eq!(counter.load(Ordering::SeqCst), 3);
        assert_eq!(handle.iterations(), 3);
        assert!(!handle.is_cancelled());
    }

    #[tokio::test]
    async fn test_cancel_stops_rearming() {
        let executor = executor("recur-cancel");
        let counter = Arc::new(AtomicU32::new(0));
        let body_counter = Arc::clone(&counter);
        let trigger = Arc::new(IntervalTrigger::every(Duration::from_millis(5)));

        let handle = RecurringTaskHandle::start(
            &executor,
            ManagedTask::repeating(move || {
                body_counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }),
            trigger,
        )
        .unwrap();

        for _ in 0..300 {
            if counter.load(Ordering::SeqCst) >= 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        assert!(counter.load(Ordering::SeqCst) >= 2);
        handle.cancel(false);
        assert!(handle.is_done());
        assert!(handle.is_cancelled());
        assert!(!handle.cancel(true));

        // No further runs land after the cancel settles
        tokio::time::sleep(Duration::from_millis(30)).await;
        let at_rest = counter.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(counter.load(Ordering::SeqCst), at_rest);
    }

    #[tokio::test]
    async fn test_policy_ending_immediately_never_schedules() {
        let executor = executor("recur-never");
        let ran = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&ran);
        let trigger = Arc::new(IntervalTrigger::every(Duration::from_millis(5)).with_limit(0));

        let handle = RecurringTaskHandle::start(
            &executor,
            ManagedTask::repeating(move || {
                flag.store(true, Ordering::SeqCst);
                Ok(())
            }),
            trigger,
        )
        .unwrap();

        assert!(handle.is_done());
        assert_eq!(handle.get().await, Err(TaskError::NeverScheduled));
        assert!(!ran.load(Ordering::SeqCst));
        assert_eq!(handle.iterations(), 0);
    }

    #[tokio::test]
    async fn test_skipped_iteration_does_not_stop_recurrence() {
        let executor = executor("recur-skip");
        let counter = Arc::new(AtomicU32::new(0));
        let body_counter = Arc::clone(&counter);
        let trigger = Arc::new(SkippingTrigger {
            period: Duration::from_millis(5),
            limit: 3,
            calls: AtomicU64::new(0),
            skip: vec![2],
        });

        let handle = RecurringTaskHandle::start(
            &executor,
            ManagedTask::repeating(move || {
                body_counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }),
            trigger,
        )
        .unwrap();

        wait_until_done(&handle).await;
        // Iteration 2 was suppressed; iterations 1 and 3 ran the body
        assert_eq!(handle.iterations(), 3);
        assert_eq!(counter.load(Ordering::SeqCst), 2);
        assert!(!handle.is_cancelled());
    }

    #[tokio::test]
    async fn test_get_resolves_while_driver_rearms() {
        // Awaiting get() across a re-arm must not wedge the driver's
        // completion path on the current-thread runtime
        let executor = executor("recur-get-rearm");
        let trigger = Arc::new(IntervalTrigger::every(Duration::from_millis(25)).with_limit(2));

        let handle =
            RecurringTaskHandle::start(&executor, ManagedTask::repeating(|| Ok(1u32)), trigger)
                .unwrap();

        let outcome = tokio::time::timeout(Duration::from_secs(5), handle.get())
            .await
            .expect("get() hung while the driver re-armed");
        assert_eq!(outcome, Ok(1));
        wait_until_done(&handle).await;
        assert_eq!(handle.iterations(), 2);
    }

    #[tokio::test]
    async fn test_policy_sees_previous_run_result() {
        struct ResultProbe {
            seen: Mutex<Vec<Option<u32>>>,
        }
        impl Trigger for ResultProbe {
            fn next_run_time(
                &self,
                last: Option<&LastExecution>,
                original: DateTime<Utc>,
            ) -> Option<DateTime<Utc>> {
                match last {
                    None => Some(original),
                    Some(last) => {
                        self.seen.lock().push(last.result_as::<u32>());
                        None
                    }
                }
            }
        }

        let executor = executor("recur-feedback");
        let trigger = Arc::new(ResultProbe {
            seen: Mutex::new(Vec::new()),
        });
        let probe = Arc::clone(&trigger);

        let handle =
            RecurringTaskHandle::start(&executor, ManagedTask::repeating(|| Ok(41u32)), trigger)
                .unwrap();

        wait_until_done(&handle).await;
        assert_eq!(handle.get().await, Ok(41));
        assert_eq!(probe.seen.lock().clone(), vec![Some(41)]);
    }

    #[tokio::test]
    async fn test_policy_panic_on_first_computation_parks_driver() {
        struct PanickyTrigger;
        impl Trigger for PanickyTrigger {
            fn next_run_time(
                &self,
                _last: Option<&LastExecution>,
                _original: DateTime<Utc>,
            ) -> Option<DateTime<Utc>> {
                panic!("policy bug");
            }
        }

        let executor = executor("recur-panic");
        let handle = RecurringTaskHandle::start(
            &executor,
            ManagedTask::repeating(|| Ok(1u32)),
            Arc::new(PanickyTrigger),
        )
        .unwrap();

        assert!(handle.is_done());
        assert_eq!(handle.get().await, Err(TaskError::NeverScheduled));
    }

    #[tokio::test]
    async fn test_rejected_after_shutdown() {
        let executor = executor("recur-reject");
        executor.internal_shutdown();
        let result = RecurringTaskHandle::start(
            &executor,
            ManagedTask::repeating(|| Ok(1u32)),
            Arc::new(IntervalTrigger::every(Duration::from_millis(5))),
        );
        assert!(matches!(result, Err(TaskError::Rejected(_))));
    }
}
