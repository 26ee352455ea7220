//! # Structured Logging Module
//!
//! Two halves:
//!
//! - [`init_structured_logging`] installs an environment-aware `tracing`
//!   subscriber for binaries and tests.
//! - The [`Logger`] sink that every pool carries in its configuration. Pools
//!   describe what they do as typed [`PoolEvent`]s and hand them to the sink;
//!   the default [`TracingLogger`] turns them into `tracing` events.

use serde::Serialize;
use std::sync::{Arc, OnceLock};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};
use uuid::Uuid;

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Initialize structured logging with environment-specific configuration
pub fn init_structured_logging() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let filter = std::env::var("STAGEPOOL_LOG")
            .or_else(|_| std::env::var("RUST_LOG"))
            .unwrap_or_else(|_| get_log_level(&environment).to_string());
        let json = std::env::var("STAGEPOOL_LOG_FORMAT")
            .map(|format| format.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        let layer = if json {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_level(true)
                .json()
                .with_filter(EnvFilter::new(filter.clone()))
                .boxed()
        } else {
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_level(true)
                .with_ansi(true)
                .with_filter(EnvFilter::new(filter.clone()))
                .boxed()
        };

        // Embedding applications may already own the global subscriber
        if tracing_subscriber::registry().with(layer).try_init().is_err() {
            tracing::debug!("Global tracing subscriber already initialized - continuing with existing subscriber");
        }

        tracing::info!(
            environment = %environment,
            filter = %filter,
            json = json,
            "🔧 STRUCTURED LOGGING: Initialized"
        );
    });
}

/// Get current environment from environment variables
fn get_environment() -> String {
    std::env::var("STAGEPOOL_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

/// Get log level based on environment
fn get_log_level(environment: &str) -> &'static str {
    match environment {
        "production" => "info",
        _ => "debug",
    }
}

/// Identity of the pool an event came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PoolLabel {
    pub pool_id: Uuid,
    pub name: String,
}

/// Lifecycle and per-payload events emitted by a pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PoolEvent {
    /// Pool constructed and its floor of executors spawned
    Started {
        min_workers: usize,
        max_workers: usize,
    },
    ExecutorStarted {
        executor_id: Uuid,
        live: usize,
    },
    /// Executor consumed a scale-down token
    ExecutorRetired {
        executor_id: Uuid,
        live: usize,
    },
    /// Executor observed the closed intake and stopped
    ExecutorExited {
        executor_id: Uuid,
    },
    PayloadAccepted {
        executor_id: Uuid,
        request_id: Uuid,
        has_error: bool,
    },
    /// Handler returned an error that is being forwarded downstream
    HandlerFailed {
        executor_id: Uuid,
        request_id: Uuid,
        error: String,
    },
    /// Handler panicked; the payload was dropped
    HandlerPanicked {
        executor_id: Uuid,
        request_id: Uuid,
        message: String,
    },
    /// Error payload forwarded without invoking the handler
    ErrorSkipped {
        executor_id: Uuid,
        request_id: Uuid,
        subscribers: usize,
    },
    ScaledUp {
        count: usize,
        live: usize,
        pending: usize,
    },
    ScaledDown {
        count: usize,
        live: usize,
        pending: usize,
    },
    IntervalChanged {
        from_ms: u64,
        to_ms: u64,
        reset: bool,
    },
    ShutdownStarted,
    ShutdownComplete {
        closed_executors: usize,
        completed: usize,
    },
}

/// Sink for pool events.
///
/// `log` receives routine events, `error` receives failures the pool itself
/// absorbed (handler panics). Implementations must be cheap: `log` is called
/// on the payload hot path.
pub trait Logger: Send + Sync {
    fn log(&self, pool: &PoolLabel, event: &PoolEvent);

    fn error(&self, pool: &PoolLabel, event: &PoolEvent);
}

/// Default sink: forwards events into `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn log(&self, pool: &PoolLabel, event: &PoolEvent) {
        let pool_id = pool.pool_id;
        let name = pool.name.as_str();
        match event {
            PoolEvent::Started {
                min_workers,
                max_workers,
            } => tracing::info!(
                pool_id = %pool_id,
                pool = name,
                min_workers = min_workers,
                max_workers = max_workers,
                "🏊 POOL: Started"
            ),
            PoolEvent::ExecutorStarted { executor_id, live } => tracing::debug!(
                pool_id = %pool_id,
                pool = name,
                executor_id = %executor_id,
                live = live,
                "EXECUTOR: Started"
            ),
            PoolEvent::ExecutorRetired { executor_id, live } => tracing::debug!(
                pool_id = %pool_id,
                pool = name,
                executor_id = %executor_id,
                live = live,
                "EXECUTOR: Retired by scale-down"
            ),
            PoolEvent::ExecutorExited { executor_id } => tracing::debug!(
                pool_id = %pool_id,
                pool = name,
                executor_id = %executor_id,
                "EXECUTOR: Intake closed, exiting"
            ),
            PoolEvent::PayloadAccepted {
                executor_id,
                request_id,
                has_error,
            } => tracing::trace!(
                pool_id = %pool_id,
                pool = name,
                executor_id = %executor_id,
                request_id = %request_id,
                has_error = has_error,
                "EXECUTOR: Payload accepted"
            ),
            PoolEvent::HandlerFailed {
                executor_id,
                request_id,
                error,
            } => tracing::debug!(
                pool_id = %pool_id,
                pool = name,
                executor_id = %executor_id,
                request_id = %request_id,
                error = %error,
                "EXECUTOR: Handler returned error, forwarding downstream"
            ),
            PoolEvent::HandlerPanicked {
                executor_id,
                request_id,
                message,
            } => tracing::warn!(
                pool_id = %pool_id,
                pool = name,
                executor_id = %executor_id,
                request_id = %request_id,
                panic_msg = %message,
                "EXECUTOR: Handler panicked"
            ),
            PoolEvent::ErrorSkipped {
                executor_id,
                request_id,
                subscribers,
            } => tracing::trace!(
                pool_id = %pool_id,
                pool = name,
                executor_id = %executor_id,
                request_id = %request_id,
                subscribers = subscribers,
                "EXECUTOR: Error forwarded without handler"
            ),
            PoolEvent::ScaledUp {
                count,
                live,
                pending,
            } => tracing::info!(
                pool_id = %pool_id,
                pool = name,
                count = count,
                live = live,
                pending = pending,
                "🔼 MANAGER: Scaled up"
            ),
            PoolEvent::ScaledDown {
                count,
                live,
                pending,
            } => tracing::info!(
                pool_id = %pool_id,
                pool = name,
                count = count,
                live = live,
                pending = pending,
                "🔽 MANAGER: Scaled down"
            ),
            PoolEvent::IntervalChanged {
                from_ms,
                to_ms,
                reset,
            } => tracing::debug!(
                pool_id = %pool_id,
                pool = name,
                from_ms = from_ms,
                to_ms = to_ms,
                reset = reset,
                "MANAGER: Check interval changed"
            ),
            PoolEvent::ShutdownStarted => tracing::info!(
                pool_id = %pool_id,
                pool = name,
                "🛑 POOL: Shutdown requested"
            ),
            PoolEvent::ShutdownComplete {
                closed_executors,
                completed,
            } => tracing::info!(
                pool_id = %pool_id,
                pool = name,
                closed_executors = closed_executors,
                completed = completed,
                "✅ POOL: Shutdown complete"
            ),
        }
    }

    fn error(&self, pool: &PoolLabel, event: &PoolEvent) {
        match event {
            PoolEvent::HandlerPanicked {
                executor_id,
                request_id,
                message,
            } => tracing::error!(
                pool_id = %pool.pool_id,
                pool = pool.name.as_str(),
                executor_id = %executor_id,
                request_id = %request_id,
                panic_msg = %message,
                "❌ EXECUTOR: Handler panicked, payload dropped"
            ),
            other => tracing::error!(
                pool_id = %pool.pool_id,
                pool = pool.name.as_str(),
                event = ?other,
                "❌ POOL: Error event"
            ),
        }
    }
}

/// Sink that discards everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopLogger;

impl Logger for NoopLogger {
    fn log(&self, _pool: &PoolLabel, _event: &PoolEvent) {}

    fn error(&self, _pool: &PoolLabel, _event: &PoolEvent) {}
}

/// The logger a pool uses when none is configured
pub fn default_logger() -> Arc<dyn Logger> {
    Arc::new(TracingLogger)
}
