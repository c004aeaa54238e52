//! # Callback Gate
//!
//! Single-winner arbitration for lifecycle callbacks. Every coordinated task
//! owns one gate per armed invocation; submission, execution start, normal
//! completion and cancellation all race to acquire it before emitting their
//! callbacks, so concurrent paths cannot double-fire a notification.
//!
//! Terminal transitions deliberately leave the gate held. A held gate is what
//! makes a finished invocation inert: late cancels and stale run wrappers
//! that lose the race find the gate taken and back off. Only the legitimate
//! re-arm of a periodic or recurring invocation releases the gate for the
//! next cycle.

use std::sync::atomic::{AtomicBool, Ordering};

/// One-word arbitration gate with free and held states.
#[derive(Debug, Default)]
pub struct CallbackGate {
    held: AtomicBool,
}

impl CallbackGate {
    /// Create a gate in the free state.
    pub fn new() -> Self {
        Self {
            held: AtomicBool::new(false),
        }
    }

    /// Attempt the free -> held transition. Returns true for the single
    /// winner; losers must not emit lifecycle callbacks for this invocation.
    pub fn acquire(&self) -> bool {
        self.held
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Return the gate to the free state. Called only when a periodic or
    /// recurring invocation is legitimately re-armed for its next cycle;
    /// terminal transitions never call this.
    pub fn release(&self) {
        self.held.store(false, Ordering::Release);
    }

    /// Current state, for diagnostics and re-check points.
    pub fn is_held(&self) -> bool {
        self.held.load(Ordering::Acquire)
    }
}
