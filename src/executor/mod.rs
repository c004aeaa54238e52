//! # Execution Facades
//!
//! The submission surfaces applications interact with: the managed executor
//! for direct submissions and the scheduled variant for time-based ones,
//! plus the diagnostics snapshot both expose.

pub mod diagnostics;
pub mod managed;
pub mod scheduled;

pub use diagnostics::ExecutorSnapshot;
pub use managed::ManagedExecutor;
pub use scheduled::ManagedScheduledExecutor;
