#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # stagepool
//!
//! Self-tuning, in-process worker pools that chain into concurrent pipelines.
//!
//! ## Overview
//!
//! A [`Pool`] runs a [`Handler`] on every value handed to it, using between
//! `min_workers` and `max_workers` executor tasks. A per-pool manager samples
//! the pool's counters on an adaptive interval and starts or retires executors
//! to follow demand. Pools subscribe to each other with [`Pool::next`], so one
//! stage's results (or errors) flow into the next stage concurrently.
//!
//! ## Key Features
//!
//! - **Backpressure**: `data` and `error` suspend the caller until an executor
//!   accepts the payload
//! - **Autoscaling**: aggressive shrink toward the floor, proactive growth up to
//!   the ceiling, with choke and relax schedules for the polling interval
//! - **Panic Isolation**: a panicking handler drops its payload, the executor
//!   keeps running
//! - **Error Routing**: handler errors travel downstream on a separate path
//! - **Graceful Shutdown**: in-flight payloads finish before the close signal
//!
//! ## Module Organization
//!
//! - [`pool`] - Pools, executors, the manager, fan-out and terminal receivers
//! - [`config`] - Pool configuration, builder and settings loading
//! - [`schedule`] - Interval schedules for the manager
//! - [`context`] - Per-payload request context
//! - [`logging`] - Structured logging setup and the pool event sink
//! - [`error`] - Construction errors and pipeline error values
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use stagepool::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> stagepool::Result<()> {
//!     stagepool::logging::init_structured_logging();
//!
//!     let square = Pool::new(
//!         PoolConfig::builder().name("square").max_workers(8).build()?,
//!         handler_fn(|_ctx: &Context, _err, n: Option<u64>| Ok(n.map(|n| n * n))),
//!     )?;
//!     let (mut results, _terminal) = receive(&square)?;
//!
//!     let producer = square.clone();
//!     tokio::spawn(async move {
//!         for n in 0..10 {
//!             producer.data(Context::new(), n).await;
//!         }
//!         producer.shutdown().await;
//!     });
//!
//!     while let Some(value) = results.recv().await {
//!         println!("{value}");
//!     }
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod constants;
pub mod context;
pub mod error;
pub mod logging;
pub mod pool;
pub mod schedule;

pub use config::{PoolConfig, PoolConfigBuilder, PoolSettings};
pub use context::Context;
pub use error::{message_error, stage_error, MessageError, PoolError, Result, StageError};
pub use logging::{Logger, NoopLogger, PoolEvent, PoolLabel, TracingLogger};
pub use pool::{
    async_handler_fn, handler_fn, receive, receive_errors, CloseNotify, Handler, HandlerResult,
    Payload, Pool, ScalingDecision, Stage, Stat,
};
pub use pool::stats::StatsSampler;
pub use schedule::{Schedule, ScheduleSpec};

/// Everything needed to build and wire pools
pub mod prelude {
    pub use crate::config::PoolConfig;
    pub use crate::context::Context;
    pub use crate::error::{message_error, stage_error, StageError};
    pub use crate::pool::{
        async_handler_fn, handler_fn, receive, receive_errors, Handler, Pool, Stage,
    };
}
