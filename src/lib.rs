#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Managed Executor
//!
//! A managed task lifecycle coordinator and trigger-driven recurring
//! scheduler for tokio-based services.
//!
//! ## Overview
//!
//! The crate decorates an injected execution engine (by default, a tokio
//! runtime handle) with the coordination protocol hosting runtimes use for
//! managed work: every submission is wrapped so callers get lifecycle
//! notifications (`submitted`, `starting`, `aborted`, `done`), a truthful
//! cancellable handle, captured-context propagation into the work item body,
//! and owner-only teardown that drains everything still outstanding.
//!
//! ## Architecture
//!
//! Coordination is built around a **lock-free callback gate** per
//! invocation: racing transitions (submission, run start, completion,
//! cancellation) arbitrate through one compare-and-set flag, terminal
//! transitions leave the gate held so late paths become inert, and exactly
//! one path delivers the terminal `done` notification. Periodic and
//! policy-driven recurring tasks reuse the same gate across iterations; the
//! reset between iterations is the only legitimate release.
//!
//! ## Key Features
//!
//! - **Exactly-once terminal delivery**: one `done` per invocation under
//!   arbitrary interleavings of completion and cancel
//! - **Truthful handles**: `get()` always agrees with the notification the
//!   observer saw, including on lost cancel races
//! - **Panic isolation**: work item and observer panics are caught, logged,
//!   and mapped to abort outcomes without poisoning the executor
//! - **Trigger-driven recurrence**: caller-supplied policies compute next
//!   run times from full previous-run records and may skip individual runs
//! - **Owner-only lifecycle**: applications cannot stop a managed executor;
//!   the hosting runtime drives teardown through `internal_shutdown`
//!
//! ## Module Organization
//!
//! - [`executor`] - the managed and scheduled submission facades
//! - [`lifecycle`] - per-invocation coordination: gate, task, handle, observer
//! - [`scheduling`] - recurrence policies and the recurrence driver
//! - [`engine`] - the execution engine abstraction and tokio binding
//! - [`context`] - captured-context propagation into bodies and callbacks
//! - [`config`] - executor configuration
//! - [`error`] - structured error handling
//! - [`logging`] - environment-aware structured logging setup
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use managed_executor::{ManagedExecutor, ManagedExecutorConfig, ManagedTask};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let executor = ManagedExecutor::tokio(ManagedExecutorConfig::named("reports"))?;
//!
//! let handle = executor.submit(ManagedTask::once(|| Ok(2 + 2)).named("sum"))?;
//! assert_eq!(handle.get().await?, 4);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod executor;
pub mod lifecycle;
pub mod logging;
pub mod scheduling;

pub use config::ManagedExecutorConfig;
pub use context::{ContextScope, ContextService, SpanContextService};
pub use engine::{EngineError, EngineTask, ExecutionEngine, TokioEngine};
pub use error::{TaskError, TaskResult};
pub use executor::{ExecutorSnapshot, ManagedExecutor, ManagedScheduledExecutor};
pub use lifecycle::{IntoManagedTask, LifecycleObserver, ManagedTask, TaskControl, TaskHandle};
pub use logging::init_structured_logging;
pub use scheduling::{IntervalTrigger, LastExecution, RecurringTaskHandle, Trigger};
