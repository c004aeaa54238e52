//! # Work Items
//!
//! A [`ManagedTask`] is the unit applications hand to a facade: a body that
//! produces a `TaskResult`, plus optional metadata (identity name, lifecycle
//! observer, contextual-callback flag). One-shot bodies are consumed on first
//! run; repeating bodies are re-invoked for every periodic or recurring
//! iteration.

use crate::error::{TaskError, TaskResult};
use crate::lifecycle::observer::LifecycleObserver;
use std::fmt;
use std::sync::Arc;

/// Executable body of a managed task.
pub(crate) enum TaskBody<T> {
    Once(Option<Box<dyn FnOnce() -> TaskResult<T> + Send>>),
    Repeating(Box<dyn FnMut() -> TaskResult<T> + Send>),
}

impl<T> TaskBody<T> {
    /// Run the body once. A one-shot body asked to run a second time reports
    /// an abort instead of silently doing nothing, so a one-shot work item
    /// submitted to a periodic schedule fails loudly on its second cycle.
    pub(crate) fn invoke(&mut self) -> TaskResult<T> {
        match self {
            TaskBody::Once(body) => match body.take() {
                Some(body) => body(),
                None => Err(TaskError::Aborted(
                    "one-shot work item already consumed".to_string(),
                )),
            },
            TaskBody::Repeating(body) => body(),
        }
    }
}

impl<T> fmt::Debug for TaskBody<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskBody::Once(body) => {
                let state = if body.is_some() { "pending" } else { "consumed" };
                f.debug_tuple("Once").field(&state).finish()
            }
            TaskBody::Repeating(_) => f.debug_tuple("Repeating").finish(),
        }
    }
}

/// A work item plus submission metadata, ready for a managed facade.
pub struct ManagedTask<T> {
    pub(crate) body: TaskBody<T>,
    pub(crate) identity: Option<String>,
    pub(crate) observer: Option<Arc<dyn LifecycleObserver>>,
    pub(crate) contextual_callbacks: bool,
}

impl<T> ManagedTask<T> {
    /// Wrap a one-shot body.
    pub fn once(body: impl FnOnce() -> TaskResult<T> + Send + 'static) -> Self {
        Self {
            body: TaskBody::Once(Some(Box::new(body))),
            identity: None,
            observer: None,
            contextual_callbacks: false,
        }
    }

    /// Wrap a body that can run on every periodic or recurring iteration.
    pub fn repeating(body: impl FnMut() -> TaskResult<T> + Send + 'static) -> Self {
        Self {
            body: TaskBody::Repeating(Box::new(body)),
            identity: None,
            observer: None,
            contextual_callbacks: false,
        }
    }

    /// Set the identity name reported through diagnostics and observers.
    pub fn named(mut self, identity: impl Into<String>) -> Self {
        self.identity = Some(identity.into());
        self
    }

    /// Attach a lifecycle observer.
    pub fn observed(mut self, observer: Arc<dyn LifecycleObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Request that observer callbacks run inside the captured submission
    /// context, like the body itself does.
    pub fn with_contextual_callbacks(mut self) -> Self {
        self.contextual_callbacks = true;
        self
    }
}

impl<T> fmt::Debug for ManagedTask<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagedTask")
            .field("body", &self.body)
            .field("identity", &self.identity)
            .field("observed", &self.observer.is_some())
            .field("contextual_callbacks", &self.contextual_callbacks)
            .finish()
    }
}

/// Conversion capability for values a facade accepts as work items.
///
/// `ManagedTask` converts to itself, which is what lets the facades accept
/// an already-wrapped item without re-wrapping it or inspecting its type.
pub trait IntoManagedTask<T> {
    fn into_managed_task(self) -> ManagedTask<T>;
}

impl<T> IntoManagedTask<T> for ManagedTask<T> {
    fn into_managed_task(self) -> ManagedTask<T> {
        self
    }
}
