use crate::error::{TaskError, TaskResult};
use serde::{Deserialize, Serialize};

/// Construction-time settings for a managed executor facade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManagedExecutorConfig {
    /// Facade name, used for task identity fallbacks, logging and
    /// diagnostics snapshots.
    pub name: String,
    /// Whether teardown-driven cancellation requests interruption of
    /// in-flight work.
    pub interrupt_on_shutdown: bool,
}

impl Default for ManagedExecutorConfig {
    fn default() -> Self {
        Self {
            name: "managed-executor".to_string(),
            interrupt_on_shutdown: true,
        }
    }
}

impl ManagedExecutorConfig {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn from_env() -> TaskResult<Self> {
        let mut config = Self::default();

        if let Ok(name) = std::env::var("MANAGED_EXECUTOR_NAME") {
            config.name = name;
        }

        if let Ok(interrupt) = std::env::var("MANAGED_EXECUTOR_INTERRUPT_ON_SHUTDOWN") {
            config.interrupt_on_shutdown = interrupt.parse().map_err(|e| {
                TaskError::Configuration(format!("Invalid interrupt_on_shutdown: {e}"))
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> TaskResult<()> {
        if self.name.trim().is_empty() {
            return Err(TaskError::Configuration(
                "executor name must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
