//! # Managed Execution Facade
//!
//! The submission surface applications use. Every incoming work item is
//! wrapped in a lifecycle coordinator before it reaches the execution
//! engine; the facade tracks outstanding invocations for teardown, rejects
//! work once its owner has shut it down, and refuses application-driven
//! lifecycle control outright (the hosting runtime owns facade lifetime).

use crate::config::ManagedExecutorConfig;
use crate::context::{ContextService, SpanContextService};
use crate::engine::{ExecutionEngine, TokioEngine};
use crate::error::{TaskError, TaskResult};
use crate::executor::diagnostics::ExecutorSnapshot;
use crate::lifecycle::coordinator::TaskCoordinator;
use crate::lifecycle::handle::TaskHandle;
use crate::lifecycle::observer::TaskControl;
use crate::lifecycle::task::{IntoManagedTask, ManagedTask};
use dashmap::DashMap;
use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Bookkeeping shared between a facade and its coordinators.
///
/// Coordinators hold this weakly; a dropped facade reads as shut down, so
/// orphaned periodic work winds itself down instead of running forever.
pub(crate) struct ExecutorShared {
    name: String,
    interrupt_on_shutdown: bool,
    shutdown: AtomicBool,
    outstanding: DashMap<Uuid, Arc<dyn TaskControl>>,
    task_seq: AtomicU64,
    submitted: AtomicU64,
    completed: AtomicU64,
    aborted: AtomicU64,
    cancelled: AtomicU64,
    skipped: AtomicU64,
    rejected: AtomicU64,
}

impl ExecutorShared {
    pub(crate) fn new(name: String, interrupt_on_shutdown: bool) -> Arc<Self> {
        Arc::new(Self {
            name,
            interrupt_on_shutdown,
            shutdown: AtomicBool::new(false),
            outstanding: DashMap::new(),
            task_seq: AtomicU64::new(0),
            submitted: AtomicU64::new(0),
            completed: AtomicU64::new(0),
            aborted: AtomicU64::new(0),
            cancelled: AtomicU64::new(0),
            skipped: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
        })
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn interrupt_on_shutdown(&self) -> bool {
        self.interrupt_on_shutdown
    }

    /// Identity fallback for work items submitted without a name.
    pub(crate) fn next_task_name(&self) -> String {
        let seq = self.task_seq.fetch_add(1, Ordering::Relaxed);
        format!("{}-task-{}", self.name, seq)
    }

    pub(crate) fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    /// One-shot shutdown transition; only the first caller wins.
    pub(crate) fn begin_shutdown(&self) -> bool {
        self.shutdown
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub(crate) fn track(&self, id: Uuid, control: Arc<dyn TaskControl>) {
        self.outstanding.insert(id, control);
        self.submitted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn finish(&self, id: Uuid, error: Option<&TaskError>) {
        self.outstanding.remove(&id);
        let counter = match error {
            None => &self.completed,
            Some(TaskError::Cancelled) => &self.cancelled,
            Some(TaskError::Skipped) => &self.skipped,
            Some(_) => &self.aborted,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_rejection(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn outstanding_len(&self) -> usize {
        self.outstanding.len()
    }

    /// Cancel every outstanding invocation. Handles are collected before
    /// cancelling so completion bookkeeping can freely mutate the map.
    pub(crate) fn drain(&self) -> usize {
        let controls: Vec<Arc<dyn TaskControl>> = self
            .outstanding
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();

        let mut cancelled = 0usize;
        for control in controls {
            let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| {
                control.cancel(self.interrupt_on_shutdown)
            }));
            match outcome {
                Ok(true) => cancelled += 1,
                Ok(false) => {}
                Err(_) => {
                    warn!(
                        executor = %self.name,
                        task = %control.identity(),
                        "Cancel during teardown panicked; continuing drain"
                    );
                }
            }
        }
        cancelled
    }

    pub(crate) fn snapshot(&self) -> ExecutorSnapshot {
        ExecutorSnapshot {
            name: self.name.clone(),
            outstanding: self.outstanding.len(),
            submitted: self.submitted.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            aborted: self.aborted.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            shutdown: self.is_shutdown(),
        }
    }
}

/// Application-facing managed executor.
///
/// Owns nothing about how work actually runs; it decorates an injected
/// execution engine with the lifecycle coordination protocol. Cloning is
/// cheap and clones share all bookkeeping.
#[derive(Clone)]
pub struct ManagedExecutor {
    shared: Arc<ExecutorShared>,
    engine: Arc<dyn ExecutionEngine>,
    context: Arc<dyn ContextService>,
}

impl ManagedExecutor {
    pub fn new(
        config: ManagedExecutorConfig,
        engine: Arc<dyn ExecutionEngine>,
        context: Arc<dyn ContextService>,
    ) -> TaskResult<Self> {
        config.validate()?;
        info!(
            executor = %config.name,
            interrupt_on_shutdown = config.interrupt_on_shutdown,
            "🚀 Managed executor initialized"
        );
        Ok(Self {
            shared: ExecutorShared::new(config.name, config.interrupt_on_shutdown),
            engine,
            context,
        })
    }

    /// Construct over the calling context's tokio runtime with span-based
    /// context propagation.
    pub fn tokio(config: ManagedExecutorConfig) -> TaskResult<Self> {
        let engine = TokioEngine::current().map_err(|e| TaskError::Configuration(e.to_string()))?;
        Self::new(config, Arc::new(engine), Arc::new(SpanContextService))
    }

    pub fn name(&self) -> &str {
        self.shared.name()
    }

    /// Submit a result-producing work item.
    #[instrument(skip(self, item), fields(executor = %self.name()))]
    pub fn submit<T, I>(&self, item: I) -> TaskResult<TaskHandle<T>>
    where
        T: Send + Sync + 'static,
        I: IntoManagedTask<T>,
    {
        let (coordinator, handle) = self.prepare(item.into_managed_task(), false)?;
        let runner = Arc::clone(&coordinator);
        let fut = async move { runner.run_once() }.boxed();
        self.launch_future(&coordinator, &handle, fut)?;
        Ok(handle)
    }

    /// Submit a one-shot closure without building a `ManagedTask` first.
    ///
    /// ```rust
    /// use managed_executor::{ManagedExecutor, ManagedExecutorConfig};
    ///
    /// # tokio_test::block_on(async {
    /// let executor = ManagedExecutor::tokio(ManagedExecutorConfig::named("docs")).unwrap();
    /// let handle = executor.submit_fn(|| Ok(21 * 2)).unwrap();
    /// assert_eq!(handle.get().await, Ok(42));
    /// # });
    /// ```
    #[instrument(skip(self, body), fields(executor = %self.name()))]
    pub fn submit_fn<T, F>(&self, body: F) -> TaskResult<TaskHandle<T>>
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> TaskResult<T> + Send + 'static,
    {
        self.submit(ManagedTask::once(body))
    }

    /// Fire-and-forget submission; the invocation is still tracked and
    /// cancelled on teardown like any other.
    pub fn execute<I>(&self, item: I) -> TaskResult<()>
    where
        I: IntoManagedTask<()>,
    {
        self.submit::<(), _>(item).map(|_| ())
    }

    /// Submit every item, preserving order. If any submission fails, the
    /// already-submitted handles are cancelled before the error is returned
    /// so a failed batch leaves no stray work behind.
    pub fn submit_all<T, I>(&self, items: Vec<I>) -> TaskResult<Vec<TaskHandle<T>>>
    where
        T: Send + Sync + 'static,
        I: IntoManagedTask<T>,
    {
        let mut handles = Vec::with_capacity(items.len());
        for item in items {
            match self.submit(item) {
                Ok(handle) => handles.push(handle),
                Err(error) => {
                    for handle in &handles {
                        handle.cancel(true);
                    }
                    return Err(error);
                }
            }
        }
        Ok(handles)
    }

    /// Submit every item and await every outcome, in submission order.
    #[instrument(skip(self, items), fields(executor = %self.name(), items = items.len()))]
    pub async fn invoke_all<T, I>(&self, items: Vec<I>) -> TaskResult<Vec<TaskResult<T>>>
    where
        T: Clone + Send + Sync + 'static,
        I: IntoManagedTask<T>,
    {
        let handles = self.submit_all(items)?;
        let outcomes = futures::future::join_all(handles.iter().map(|handle| handle.get())).await;
        Ok(outcomes)
    }

    /// Submit every item and return the first successful result, cancelling
    /// the rest. If every item fails, the last failure is returned.
    #[instrument(skip(self, items), fields(executor = %self.name(), items = items.len()))]
    pub async fn invoke_any<T, I>(&self, items: Vec<I>) -> TaskResult<T>
    where
        T: Clone + Send + Sync + 'static,
        I: IntoManagedTask<T>,
    {
        self.invoke_any_inner(items, None).await
    }

    /// `invoke_any` with a bound on the overall wait.
    pub async fn invoke_any_timeout<T, I>(&self, items: Vec<I>, timeout: Duration) -> TaskResult<T>
    where
        T: Clone + Send + Sync + 'static,
        I: IntoManagedTask<T>,
    {
        self.invoke_any_inner(items, Some(timeout)).await
    }

    async fn invoke_any_inner<T, I>(
        &self,
        items: Vec<I>,
        timeout: Option<Duration>,
    ) -> TaskResult<T>
    where
        T: Clone + Send + Sync + 'static,
        I: IntoManagedTask<T>,
    {
        if items.is_empty() {
            return Err(TaskError::InvalidInput(
                "invoke_any requires at least one work item".to_string(),
            ));
        }
        let handles = self.submit_all(items)?;

        let race = async {
            let mut pending: FuturesUnordered<_> = handles
                .iter()
                .map(|handle| {
                    let handle = handle.clone();
                    async move { handle.get().await }
                })
                .collect();
            let mut last_error = None;
            while let Some(outcome) = pending.next().await {
                match outcome {
                    Ok(value) => return Ok(value),
                    Err(error) => last_error = Some(error),
                }
            }
            Err(last_error.unwrap_or_else(|| {
                TaskError::InvalidInput("no work item produced an outcome".to_string())
            }))
        };

        let result = match timeout {
            Some(timeout) => match tokio::time::timeout(timeout, race).await {
                Ok(result) => result,
                Err(_) => Err(TaskError::Timeout),
            },
            None => race.await,
        };

        for handle in &handles {
            handle.cancel(true);
        }
        result
    }

    /// Owner-only teardown: reject new submissions and cancel everything
    /// outstanding. Idempotent; returns how many invocations this call
    /// actually cancelled.
    #[instrument(skip(self), fields(executor = %self.name()))]
    pub fn internal_shutdown(&self) -> usize {
        if !self.shared.begin_shutdown() {
            return 0;
        }
        info!(
            executor = %self.shared.name(),
            outstanding = self.shared.outstanding_len(),
            "🛑 Internal shutdown: draining outstanding tasks"
        );
        let cancelled = self.shared.drain();
        info!(
            executor = %self.shared.name(),
            cancelled,
            "Internal shutdown complete"
        );
        cancelled
    }

    /// Applications may not stop a managed executor.
    pub fn shutdown(&self) -> TaskResult<()> {
        Err(TaskError::LifecycleForbidden(
            "shutdown is owned by the hosting runtime".to_string(),
        ))
    }

    /// Applications may not stop a managed executor.
    pub fn shutdown_now(&self) -> TaskResult<()> {
        Err(TaskError::LifecycleForbidden(
            "shutdown_now is owned by the hosting runtime".to_string(),
        ))
    }

    /// Applications may not await a lifecycle they cannot drive.
    pub fn await_termination(&self, _timeout: Duration) -> TaskResult<bool> {
        Err(TaskError::LifecycleForbidden(
            "await_termination is owned by the hosting runtime".to_string(),
        ))
    }

    /// Always false for applications; internal teardown state is owner-only.
    pub fn is_shutdown(&self) -> bool {
        false
    }

    /// Always false for applications; internal teardown state is owner-only.
    pub fn is_terminated(&self) -> bool {
        false
    }

    pub fn snapshot(&self) -> ExecutorSnapshot {
        self.shared.snapshot()
    }

    pub(crate) fn shared(&self) -> &Arc<ExecutorShared> {
        &self.shared
    }

    pub(crate) fn engine(&self) -> &Arc<dyn ExecutionEngine> {
        &self.engine
    }

    pub(crate) fn context(&self) -> &Arc<dyn ContextService> {
        &self.context
    }

    /// Shutdown-check, wrap and fire the submitted notification. The spawn
    /// itself is the caller's job via `launch_future`, which lets scheduling
    /// variants compose their own run futures around the same coordinator.
    pub(crate) fn prepare<T>(
        &self,
        task: ManagedTask<T>,
        periodic: bool,
    ) -> TaskResult<(Arc<TaskCoordinator<T>>, TaskHandle<T>)>
    where
        T: Send + Sync + 'static,
    {
        if self.shared.is_shutdown() {
            self.shared.record_rejection();
            return Err(TaskError::Rejected(format!(
                "executor '{}' is shut down",
                self.shared.name()
            )));
        }
        let identity = task
            .identity
            .clone()
            .unwrap_or_else(|| self.shared.next_task_name());
        let scope = self.context.capture();
        let coordinator = TaskCoordinator::new(
            task,
            identity,
            self.shared.name().to_string(),
            scope,
            periodic,
            Arc::downgrade(&self.shared),
        );
        let handle = coordinator.handle();
        coordinator.on_submitted();
        Ok((coordinator, handle))
    }

    /// Hand the run future to the engine and close the shutdown race: a
    /// teardown that began concurrently with this submission finds the
    /// handle either in the outstanding set (drained there) or cancelled
    /// here before the caller ever sees it.
    pub(crate) fn launch_future<T>(
        &self,
        coordinator: &Arc<TaskCoordinator<T>>,
        handle: &TaskHandle<T>,
        fut: BoxFuture<'static, ()>,
    ) -> TaskResult<()>
    where
        T: Send + Sync + 'static,
    {
        match self.engine.spawn(fut) {
            Ok(task) => {
                handle.core().attach_engine(task);
                if self.shared.is_shutdown() {
                    handle.cancel(self.shared.interrupt_on_shutdown());
                    self.shared.record_rejection();
                    return Err(TaskError::Rejected(format!(
                        "executor '{}' shut down during submission",
                        self.shared.name()
                    )));
                }
                Ok(())
            }
            Err(engine_error) => {
                let error = TaskError::SubmitFailed(engine_error.to_string());
                coordinator.on_submit_failed(error.clone());
                Err(error)
            }
        }
    }
}

impl std::fmt::Debug for ManagedExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagedExecutor")
            .field("name", &self.shared.name())
            .field("outstanding", &self.shared.outstanding_len())
            .field("shutdown", &self.shared.is_shutdown())
            .finish()
    }
}
