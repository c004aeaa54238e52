//! Error types for the managed executor system.
//!

use thiserror::Error;

/// Terminal and submission-path errors for managed tasks.
///
/// Cancellation and skips are modeled as dedicated variants rather than
/// wrapped execution errors so that callers and lifecycle observers can
/// tell the three terminal families apart: aborted (the work item itself
/// failed), cancelled (a caller withdrew the work), skipped (a recurrence
/// policy suppressed one run).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TaskError {
    #[error("Task aborted: {0}")]
    Aborted(String),
    #[error("Task was cancelled")]
    Cancelled,
    #[error("Task run was skipped by its recurrence policy")]
    Skipped,
    #[error("Task rejected: {0}")]
    Rejected(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Lifecycle operation forbidden: {0}")]
    LifecycleForbidden(String),
    #[error("Submission failed: {0}")]
    SubmitFailed(String),
    #[error("Recurrence policy produced no first run time")]
    NeverScheduled,
    #[error("Timed out waiting for task result")]
    Timeout,
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl TaskError {
    /// True for the cancellation terminal outcome.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, TaskError::Cancelled)
    }

    /// True for the skip terminal outcome of a single recurring run.
    pub fn is_skip(&self) -> bool {
        matches!(self, TaskError::Skipped)
    }

    /// True for outcomes that count as an abort of the work item itself
    /// (everything terminal except cancellation and skips).
    pub fn is_abort(&self) -> bool {
        !self.is_cancellation() && !self.is_skip()
    }
}

pub type TaskResult<T> = anyhow::Result<T, TaskError>;
