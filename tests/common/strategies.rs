//! Proptest strategies over the crate's public value types.

use managed_executor::{ExecutorSnapshot, ManagedExecutorConfig, TaskError};
use proptest::prelude::*;
use std::time::Duration;

/// Any error the crate can surface to a caller.
pub fn task_error_strategy() -> impl Strategy<Value = TaskError> {
    prop_oneof![
        any::<String>().prop_map(TaskError::Aborted),
        Just(TaskError::Cancelled),
        Just(TaskError::Skipped),
        any::<String>().prop_map(TaskError::Rejected),
        any::<String>().prop_map(TaskError::InvalidInput),
        any::<String>().prop_map(TaskError::LifecycleForbidden),
        any::<String>().prop_map(TaskError::SubmitFailed),
        Just(TaskError::NeverScheduled),
        Just(TaskError::Timeout),
        any::<String>().prop_map(TaskError::Configuration),
    ]
}

/// Periods from 1ms up to 10s.
pub fn period_strategy() -> impl Strategy<Value = Duration> {
    (1u64..10_000).prop_map(Duration::from_millis)
}

/// Valid executor configurations.
pub fn config_strategy() -> impl Strategy<Value = ManagedExecutorConfig> {
    ("[a-z][a-z0-9-]{0,30}", any::<bool>()).prop_map(|(name, interrupt_on_shutdown)| {
        ManagedExecutorConfig {
            name,
            interrupt_on_shutdown,
        }
    })
}

/// Arbitrary bookkeeping snapshots.
pub fn snapshot_strategy() -> impl Strategy<Value = ExecutorSnapshot> {
    (
        "[a-z][a-z0-9-]{0,15}",
        0usize..100,
        0u64..1000,
        0u64..1000,
        0u64..1000,
        0u64..1000,
        0u64..1000,
        0u64..1000,
        any::<bool>(),
    )
        .prop_map(
            |(name, outstanding, submitted, completed, aborted, cancelled, skipped, rejected, shutdown)| {
                ExecutorSnapshot {
                    name,
                    outstanding,
                    submitted,
                    completed,
                    aborted,
                    cancelled,
                    skipped,
                    rejected,
                    shutdown,
                }
            },
        )
}
