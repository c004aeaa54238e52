//! # Context Propagation
//!
//! Work items run on engine worker threads, far from the call site that
//! submitted them. The context service captures the submitter's invocation
//! environment once at submission time; the resulting scope is re-entered
//! around every run of the body and, when the task metadata asks for it,
//! around lifecycle observer callbacks as well.
//!
//! The crate stays agnostic of what "context" means. The default service
//! propagates the submitter's `tracing` span so that task logs attach to the
//! operation that submitted the work.

use std::sync::Arc;
use tracing::Span;

/// A captured invocation environment.
///
/// Implementations must install the environment before invoking `work` and
/// restore the previous one afterwards, including when `work` panics.
pub trait ContextScope: Send + Sync {
    fn run(&self, work: &mut dyn FnMut());
}

/// Capture service injected into facades at construction time.
pub trait ContextService: Send + Sync {
    /// Snapshot the current invocation environment for later re-entry.
    fn capture(&self) -> Arc<dyn ContextScope>;
}

/// Default context service: captures the current `tracing` span.
#[derive(Debug, Default)]
pub struct SpanContextService;

impl ContextService for SpanContextService {
    fn capture(&self) -> Arc<dyn ContextScope> {
        Arc::new(SpanScope {
            span: Span::current(),
        })
    }
}

struct SpanScope {
    span: Span,
}

impl ContextScope for SpanScope {
    fn run(&self, work: &mut dyn FnMut()) {
        self.span.in_scope(|| work());
    }
}

/// Run a value-returning closure inside a captured scope.
///
/// Bridges the object-safe `&mut dyn FnMut()` surface to ordinary `FnOnce`
/// call sites. The scope contract requires `work` to be invoked exactly once.
pub(crate) fn run_scoped<T>(scope: &dyn ContextScope, work: impl FnOnce() -> T) -> T {
    let mut work = Some(work);
    let mut output = None;
    let mut call = || {
        if let Some(work) = work.take() {
            output = Some(work());
        }
    };
    scope.run(&mut call);
    output.expect("context scope did not invoke the delegated work")
}
