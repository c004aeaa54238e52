//! # Structured Logging Module
//!
//! Environment-aware structured logging for tracing lifecycle notifications
//! and scheduling decisions across worker threads. Console output only; the
//! hosting process owns log shipping.

use std::process;
use std::sync::OnceLock;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging with environment-specific configuration.
///
/// Idempotent, and tolerant of a globally installed subscriber (test
/// harnesses and embedding hosts often set one first).
pub fn init_structured_logging() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let filter = get_log_filter(&environment);
        let json_output = environment == "production";

        let console_layer = fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .with_level(true)
            .with_ansi(!json_output);

        let subscriber = tracing_subscriber::registry().with(if json_output {
            console_layer
                .json()
                .with_filter(EnvFilter::new(filter.clone()))
                .boxed()
        } else {
            console_layer
                .with_filter(EnvFilter::new(filter.clone()))
                .boxed()
        });

        // Use try_init to avoid panic if a global subscriber already exists
        if subscriber.try_init().is_err() {
            tracing::debug!(
                "Global tracing subscriber already initialized - continuing with existing subscriber"
            );
        }

        tracing::info!(
            pid = process::id(),
            environment = %environment,
            filter = %filter,
            "🔧 STRUCTURED LOGGING: Initialized"
        );
    });
}

/// Get current environment from environment variables
fn get_environment() -> String {
    std::env::var("MANAGED_EXECUTOR_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

/// Get the log filter directive: an explicit `MANAGED_EXECUTOR_LOG` wins,
/// otherwise the level follows the environment
fn get_log_filter(environment: &str) -> String {
    if let Ok(explicit) = std::env::var("MANAGED_EXECUTOR_LOG") {
        return explicit;
    }
    match environment {
        "test" => "debug".to_string(),
        "development" => "debug".to_string(),
        "production" => "info".to_string(),
        _ => "debug".to_string(),
    }
}
