//! # Invocation Lifecycle
//!
//! The per-invocation coordination protocol: the callback gate that
//! arbitrates racing lifecycle transitions, the work item wrapper, the
//! observer surface, the caller-facing handle, and the coordinator that
//! strings them together.
//!
//! ## Core Components
//!
//! - **CallbackGate**: lock-free mutual-exclusion flag; terminal transitions
//!   leave it held so late paths become inert
//! - **ManagedTask**: a work item plus its identity, observer, and context
//!   preferences
//! - **TaskHandle**: future-like view of one invocation's eventual outcome
//! - **TaskCoordinator**: drives submitted/starting/done notifications with
//!   exactly-once terminal delivery under arbitrary interleavings

pub mod coordinator;
pub mod gate;
pub mod handle;
pub mod observer;
pub mod task;

pub use handle::TaskHandle;
pub use observer::{LifecycleObserver, TaskControl};
pub use task::{IntoManagedTask, ManagedTask};
