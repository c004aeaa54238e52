//! # Trigger-Driven Scheduling
//!
//! Recurrence policies and the driver that turns one policy plus one work
//! item into a chain of one-shot iterations.

pub mod recurring;
pub mod trigger;

pub use recurring::RecurringTaskHandle;
pub use trigger::{IntervalTrigger, LastExecution, Trigger};
