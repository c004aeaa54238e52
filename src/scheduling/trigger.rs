//! # Recurrence Policies
//!
//! A [`Trigger`] decides when a recurring task runs next and whether a given
//! run should be skipped. The policy sees the full record of the previous
//! run (timing, skip flag, result) and can therefore implement calendars,
//! backoff, run limits, or outcome-dependent schedules.

use chrono::{DateTime, Utc};
use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Caller-supplied recurrence policy.
pub trait Trigger: Send + Sync {
    /// Compute the next run time, given the previous run (None before the
    /// first run) and the fixed original scheduled start. Returning `None`
    /// ends the recurrence.
    fn next_run_time(
        &self,
        last: Option<&LastExecution>,
        original_scheduled_start: DateTime<Utc>,
    ) -> Option<DateTime<Utc>>;

    /// Decide whether the run scheduled at `scheduled_run` should be
    /// suppressed. A skipped run never invokes the work item body and is
    /// reported as a distinct skip outcome, not an abort.
    fn skip_run(&self, _last: Option<&LastExecution>, _scheduled_run: DateTime<Utc>) -> bool {
        false
    }
}

/// Per-run metadata fed back into the recurrence policy.
#[derive(Clone)]
pub struct LastExecution {
    identity: String,
    scheduled_start: DateTime<Utc>,
    run_start: Option<DateTime<Utc>>,
    run_end: Option<DateTime<Utc>>,
    skipped: bool,
    result: Option<Arc<dyn Any + Send + Sync>>,
}

impl LastExecution {
    pub(crate) fn new(identity: String, scheduled_start: DateTime<Utc>) -> Self {
        Self {
            identity,
            scheduled_start,
            run_start: None,
            run_end: None,
            skipped: false,
            result: None,
        }
    }

    pub(crate) fn record_run(&mut self, start: DateTime<Utc>, end: DateTime<Utc>) {
        self.run_start = Some(start);
        self.run_end = Some(end);
    }

    pub(crate) fn mark_skipped(&mut self) {
        self.skipped = true;
    }

    pub(crate) fn record_result(&mut self, result: Arc<dyn Any + Send + Sync>) {
        self.result = Some(result);
    }

    /// Identity of the recurring task this run belonged to.
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// When this run was scheduled to start.
    pub fn scheduled_start(&self) -> DateTime<Utc> {
        self.scheduled_start
    }

    /// When the body actually started; `None` for skipped runs.
    pub fn run_start(&self) -> Option<DateTime<Utc>> {
        self.run_start
    }

    /// When the body finished; `None` for skipped runs.
    pub fn run_end(&self) -> Option<DateTime<Utc>> {
        self.run_end
    }

    /// Whether the policy suppressed this run.
    pub fn skipped(&self) -> bool {
        self.skipped
    }

    /// The run's result, if it produced one of type `R`. Failed and skipped
    /// runs carry no result.
    pub fn result_as<R: Clone + 'static>(&self) -> Option<R> {
        self.result.as_ref()?.downcast_ref::<R>().cloned()
    }
}

impl fmt::Debug for LastExecution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LastExecution")
            .field("identity", &self.identity)
            .field("scheduled_start", &self.scheduled_start)
            .field("run_start", &self.run_start)
            .field("run_end", &self.run_end)
            .field("skipped", &self.skipped)
            .field("has_result", &self.result.is_some())
            .finish()
    }
}

/// Fixed-interval policy: run at the original scheduled start, then every
/// `period` after the previous scheduled start, optionally stopping after a
/// total number of runs.
#[derive(Debug)]
pub struct IntervalTrigger {
    period: Duration,
    limit: Option<u64>,
    completed: AtomicU64,
}

impl IntervalTrigger {
    pub fn every(period: Duration) -> Self {
        Self {
            period,
            limit: None,
            completed: AtomicU64::new(0),
        }
    }

    /// Stop after `runs` total runs.
    pub fn with_limit(mut self, runs: u64) -> Self {
        self.limit = Some(runs);
        self
    }
}

impl Trigger for IntervalTrigger {
    fn next_run_time(
        &self,
        last: Option<&LastExecution>,
        original_scheduled_start: DateTime<Utc>,
    ) -> Option<DateTime<Utc>> {
        match last {
            None => {
                if self.limit == Some(0) {
                    return None;
                }
                Some(original_scheduled_start)
            }
            Some(last) => {
                let completed = self.completed.fetch_add(1, Ordering::Relaxed) + 1;
                if let Some(limit) = self.limit {
                    if completed >= limit {
                        return None;
                    }
                }
                let period = chrono::Duration::from_std(self.period).ok()?;
                Some(last.scheduled_start() + period)
            }
        }
    }
}
