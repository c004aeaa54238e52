//! Recurrence policy doubles.

use chrono::{DateTime, Utc};
use managed_executor::{LastExecution, Trigger};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Schedules a fixed number of runs, each `spacing` after the computation
/// that produced it, recording every scheduled start it hands out.
pub struct CountdownTrigger {
    spacing: Duration,
    runs: u64,
    calls: AtomicU64,
    scheduled: Mutex<Vec<DateTime<Utc>>>,
}

impl CountdownTrigger {
    pub fn new(spacing: Duration, runs: u64) -> Self {
        Self {
            spacing,
            runs,
            calls: AtomicU64::new(0),
            scheduled: Mutex::new(Vec::new()),
        }
    }

    /// Every scheduled start handed out so far, in order.
    pub fn scheduled_starts(&self) -> Vec<DateTime<Utc>> {
        self.scheduled.lock().clone()
    }
}

impl Trigger for CountdownTrigger {
    fn next_run_time(
        &self,
        _last: Option<&LastExecution>,
        _original: DateTime<Utc>,
    ) -> Option<DateTime<Utc>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call >= self.runs {
            return None;
        }
        let next = Utc::now() + chrono::Duration::from_std(self.spacing).ok()?;
        self.scheduled.lock().push(next);
        Some(next)
    }
}

/// Like [`CountdownTrigger`], but suppresses the listed one-based runs.
pub struct SkipListTrigger {
    inner: CountdownTrigger,
    skip: Vec<u64>,
}

impl SkipListTrigger {
    pub fn new(spacing: Duration, runs: u64, skip: Vec<u64>) -> Self {
        Self {
            inner: CountdownTrigger::new(spacing, runs),
            skip,
        }
    }
}

impl Trigger for SkipListTrigger {
    fn next_run_time(
        &self,
        last: Option<&LastExecution>,
        original: DateTime<Utc>,
    ) -> Option<DateTime<Utc>> {
        self.inner.next_run_time(last, original)
    }

    fn skip_run(&self, _last: Option<&LastExecution>, _scheduled_run: DateTime<Utc>) -> bool {
        // next_run_time has already been called once for the pending run
        let iteration = self.inner.calls.load(Ordering::SeqCst);
        self.skip.contains(&iteration)
    }
}
