//! # Scheduled Execution Facade
//!
//! Extends the managed surface with time-based submission: delayed one-shot
//! runs, fixed-rate and fixed-delay periodic runs, and policy-driven
//! recurring runs. Every scheduled invocation goes through the same
//! lifecycle coordination as direct submissions, so shutdown drains parked
//! and periodic work exactly like in-flight work.

use crate::config::ManagedExecutorConfig;
use crate::context::ContextService;
use crate::engine::ExecutionEngine;
use crate::error::{TaskError, TaskResult};
use crate::executor::diagnostics::ExecutorSnapshot;
use crate::executor::managed::ManagedExecutor;
use crate::lifecycle::handle::TaskHandle;
use crate::lifecycle::task::IntoManagedTask;
use crate::scheduling::recurring::RecurringTaskHandle;
use crate::scheduling::trigger::Trigger;
use futures::FutureExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::instrument;

/// Application-facing managed scheduled executor.
///
/// A thin layer over [`ManagedExecutor`]; direct submissions delegate
/// unchanged, scheduling operations compose timed run futures around the
/// same per-invocation coordinators.
#[derive(Clone)]
pub struct ManagedScheduledExecutor {
    inner: ManagedExecutor,
}

impl ManagedScheduledExecutor {
    pub fn new(
        config: ManagedExecutorConfig,
        engine: Arc<dyn ExecutionEngine>,
        context: Arc<dyn ContextService>,
    ) -> TaskResult<Self> {
        Ok(Self {
            inner: ManagedExecutor::new(config, engine, context)?,
        })
    }

    /// Construct over the calling context's tokio runtime with span-based
    /// context propagation.
    pub fn tokio(config: ManagedExecutorConfig) -> TaskResult<Self> {
        Ok(Self {
            inner: ManagedExecutor::tokio(config)?,
        })
    }

    /// The plain submission surface this facade extends.
    pub fn executor(&self) -> &ManagedExecutor {
        &self.inner
    }

    pub fn name(&self) -> &str {
        self.inner.name()
    }

    /// Run a work item once after `delay`.
    ///
    /// ```rust
    /// use managed_executor::{ManagedExecutorConfig, ManagedScheduledExecutor, ManagedTask};
    /// use std::time::Duration;
    ///
    /// # tokio_test::block_on(async {
    /// let executor =
    ///     ManagedScheduledExecutor::tokio(ManagedExecutorConfig::named("docs")).unwrap();
    /// let handle = executor
    ///     .schedule_once(ManagedTask::once(|| Ok("ready")), Duration::from_millis(5))
    ///     .unwrap();
    /// assert_eq!(handle.get().await, Ok("ready"));
    /// # });
    /// ```
    #[instrument(skip(self, item), fields(executor = %self.name()))]
    pub fn schedule_once<T, I>(&self, item: I, delay: Duration) -> TaskResult<TaskHandle<T>>
    where
        T: Send + Sync + 'static,
        I: IntoManagedTask<T>,
    {
        let (coordinator, handle) = self.inner.prepare(item.into_managed_task(), false)?;
        let runner = Arc::clone(&coordinator);
        let deadline = Instant::now() + delay;
        let fut = async move {
            tokio::time::sleep_until(deadline).await;
            runner.run_once();
        }
        .boxed();
        self.inner.launch_future(&coordinator, &handle, fut)?;
        Ok(handle)
    }

    /// Run a work item repeatedly on a fixed cadence measured from each
    /// run's scheduled start. A run that overruns its period delays the
    /// next one rather than running concurrently with it.
    #[instrument(skip(self, item), fields(executor = %self.name()))]
    pub fn schedule_at_fixed_rate<T, I>(
        &self,
        item: I,
        initial_delay: Duration,
        period: Duration,
    ) -> TaskResult<TaskHandle<T>>
    where
        T: Send + Sync + 'static,
        I: IntoManagedTask<T>,
    {
        if period.is_zero() {
            return Err(TaskError::InvalidInput(
                "fixed-rate period must be positive".to_string(),
            ));
        }
        self.schedule_periodic(item, initial_delay, move |next| next + period)
    }

    /// Run a work item repeatedly, waiting `delay` after each run finishes
    /// before starting the next.
    #[instrument(skip(self, item), fields(executor = %self.name()))]
    pub fn schedule_with_fixed_delay<T, I>(
        &self,
        item: I,
        initial_delay: Duration,
        delay: Duration,
    ) -> TaskResult<TaskHandle<T>>
    where
        T: Send + Sync + 'static,
        I: IntoManagedTask<T>,
    {
        if delay.is_zero() {
            return Err(TaskError::InvalidInput(
                "fixed-delay interval must be positive".to_string(),
            ));
        }
        self.schedule_periodic(item, initial_delay, move |_next| Instant::now() + delay)
    }

    fn schedule_periodic<T, I, N>(
        &self,
        item: I,
        initial_delay: Duration,
        next_deadline: N,
    ) -> TaskResult<TaskHandle<T>>
    where
        T: Send + Sync + 'static,
        I: IntoManagedTask<T>,
        N: Fn(Instant) -> Instant + Send + 'static,
    {
        let (coordinator, handle) = self.inner.prepare(item.into_managed_task(), true)?;
        let runner = Arc::clone(&coordinator);
        let run_handle = handle.clone();
        let fut = async move {
            let mut next = Instant::now() + initial_delay;
            loop {
                tokio::time::sleep_until(next).await;
                if run_handle.is_done() {
                    break;
                }
                // An orphaned or shut-down facade winds the loop down
                // instead of ticking forever
                if runner.facade_shut_down() {
                    run_handle.cancel(false);
                    break;
                }
                runner.run_once();
                if run_handle.is_done() {
                    break;
                }
                next = next_deadline(next);
            }
        }
        .boxed();
        self.inner.launch_future(&coordinator, &handle, fut)?;
        Ok(handle)
    }

    /// Run a work item on a caller-supplied recurrence policy. The policy
    /// decides each next run time from the previous run's record and may
    /// suppress individual runs; it runs inside the submitter's captured
    /// context.
    #[instrument(skip(self, item, trigger), fields(executor = %self.name()))]
    pub fn schedule_recurring<T, I>(
        &self,
        item: I,
        trigger: Arc<dyn Trigger>,
    ) -> TaskResult<RecurringTaskHandle<T>>
    where
        T: Clone + Send + Sync + 'static,
        I: IntoManagedTask<T>,
    {
        RecurringTaskHandle::start(&self.inner, item.into_managed_task(), trigger)
    }

    /// Submit a result-producing work item immediately.
    pub fn submit<T, I>(&self, item: I) -> TaskResult<TaskHandle<T>>
    where
        T: Send + Sync + 'static,
        I: IntoManagedTask<T>,
    {
        self.inner.submit(item)
    }

    /// Submit a one-shot closure without building a `ManagedTask` first.
    pub fn submit_fn<T, F>(&self, body: F) -> TaskResult<TaskHandle<T>>
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> TaskResult<T> + Send + 'static,
    {
        self.inner.submit_fn(body)
    }

    /// Fire-and-forget immediate submission.
    pub fn execute<I>(&self, item: I) -> TaskResult<()>
    where
        I: IntoManagedTask<()>,
    {
        self.inner.execute(item)
    }

    /// Owner-only teardown; see [`ManagedExecutor::internal_shutdown`].
    pub fn internal_shutdown(&self) -> usize {
        self.inner.internal_shutdown()
    }

    /// Applications may not stop a managed executor.
    pub fn shutdown(&self) -> TaskResult<()> {
        self.inner.shutdown()
    }

    /// Applications may not stop a managed executor.
    pub fn shutdown_now(&self) -> TaskResult<()> {
        self.inner.shutdown_now()
    }

    /// Applications may not await a lifecycle they cannot drive.
    pub fn await_termination(&self, timeout: Duration) -> TaskResult<bool> {
        self.inner.await_termination(timeout)
    }

    pub fn is_shutdown(&self) -> bool {
        self.inner.is_shutdown()
    }

    pub fn is_terminated(&self) -> bool {
        self.inner.is_terminated()
    }

    pub fn snapshot(&self) -> ExecutorSnapshot {
        self.inner.snapshot()
    }
}

impl std::fmt::Debug for ManagedScheduledExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagedScheduledExecutor")
            .field("inner", &self.inner)
            .finish()
    }
}
