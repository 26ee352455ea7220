//! # Pool Module
//!
//! A [`Pool`] is one pipeline stage: an intake, a set of executor tasks running
//! a [`Handler`], a list of downstream subscribers, and a manager task that
//! resizes the executor set between the configured bounds.
//!
//! ## Key Components
//!
//! - [`Pool`] - Public contract: data, error, next, stats, shutdown, close notify
//! - `executor` - Executor loop with panic isolation and fan-out
//! - `manager` - Autoscaling control loop
//! - [`scaling`] - Pure scaling and interval decisions
//! - [`stats`] - Lock-free counters and snapshots
//! - [`receive`] - Terminal stages that surface results on channels
//!
//! ```rust,no_run
//! use stagepool::prelude::*;
//!
//! # async fn example() -> stagepool::Result<()> {
//! let parse = Pool::new(
//!     PoolConfig::builder().name("parse").max_workers(4).build()?,
//!     handler_fn(|_ctx: &Context, _err, line: Option<String>| {
//!         Ok(line.map(|l| l.trim().len()))
//!     }),
//! )?;
//! let (mut lengths, _sink) = receive(&parse)?;
//!
//! parse.data(Context::new(), "  hello ".to_string()).await;
//! assert_eq!(lengths.recv().await, Some(5));
//!
//! parse.shutdown().await;
//! # Ok(())
//! # }
//! ```

mod executor;
pub mod handler;
mod handoff;
mod manager;
pub mod payload;
pub mod receive;
pub mod scaling;
pub mod stage;
pub mod stats;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::debug;
use uuid::Uuid;

use crate::config::PoolConfig;
use crate::context::Context;
use crate::error::{PoolError, Result, StageError};
use crate::logging::{PoolEvent, PoolLabel};

use self::executor::Executor;
use self::handoff::{handoff, HandoffReceiver, HandoffSender};
use self::manager::Manager;
use self::stats::{Counters, StatsSampler};

pub use self::handler::{async_handler_fn, handler_fn, Handler, HandlerResult};
pub use self::payload::Payload;
pub use self::receive::{receive, receive_errors};
pub use self::scaling::ScalingDecision;
pub use self::stage::{CloseNotify, Stage};
pub use self::stats::Stat;

/// Self-scaling worker pool forming one pipeline stage.
///
/// Consumes `I` values, runs the handler, and forwards `O` values (or errors)
/// to every subscriber registered with [`Pool::next`]. Cloning is cheap and
/// every clone drives the same pool.
///
/// A pool's tasks keep running until [`Pool::shutdown`] is called; dropping
/// the handles does not stop them.
pub struct Pool<I, O> {
    inner: Arc<PoolInner<I, O>>,
}

impl<I, O> Clone for Pool<I, O> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// State shared by the pool handle, its executors and its manager
pub(crate) struct PoolInner<I, O> {
    pub(crate) label: PoolLabel,
    pub(crate) config: PoolConfig,
    pub(crate) handler: Arc<dyn Handler<I, O>>,
    pub(crate) counters: Arc<Counters>,
    pub(crate) runtime: Handle,
    /// Taken on shutdown; producers clone it per send
    intake: Mutex<Option<HandoffSender<Payload<I>>>>,
    pub(crate) intake_rx: HandoffReceiver<Payload<I>>,
    pub(crate) retire_rx: HandoffReceiver<()>,
    subscribers: RwLock<Vec<Arc<dyn Stage<O>>>>,
    closed: AtomicBool,
    /// Completion barrier: every executor holds a clone of this sender
    barrier: Mutex<Option<mpsc::Sender<()>>>,
    drained: tokio::sync::Mutex<Option<mpsc::Receiver<()>>>,
    manager_stop: CancellationToken,
    /// In-flight fan-out sends to subscribers
    forwards: TaskTracker,
    close_tx: watch::Sender<bool>,
}

impl<I, O> Pool<I, O>
where
    I: Send + 'static,
    O: Clone + Send + Sync + 'static,
{
    /// Create a pool, start `min_workers` executors and the manager.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new<H>(config: PoolConfig, handler: H) -> Result<Self>
    where
        H: Handler<I, O>,
    {
        Self::with_shared_handler(config, Arc::new(handler))
    }

    /// Create a pool around a handler that is also referenced elsewhere
    pub fn with_shared_handler(config: PoolConfig, handler: Arc<dyn Handler<I, O>>) -> Result<Self> {
        config.validate()?;
        let runtime = Handle::try_current().map_err(|_| PoolError::NoRuntime)?;

        let pool_id = Uuid::new_v4();
        let name = config
            .name
            .clone()
            .unwrap_or_else(|| pool_id.simple().to_string()[..8].to_string());
        let (intake_tx, intake_rx) = handoff();
        let (retire_tx, retire_rx) = handoff();
        let (barrier_tx, barrier_rx) = mpsc::channel(1);
        let (close_tx, _) = watch::channel(false);

        let inner = Arc::new(PoolInner {
            label: PoolLabel { pool_id, name },
            config,
            handler,
            counters: Arc::new(Counters::new()),
            runtime,
            intake: Mutex::new(Some(intake_tx)),
            intake_rx,
            retire_rx,
            subscribers: RwLock::new(Vec::new()),
            closed: AtomicBool::new(false),
            barrier: Mutex::new(Some(barrier_tx)),
            drained: tokio::sync::Mutex::new(Some(barrier_rx)),
            manager_stop: CancellationToken::new(),
            forwards: TaskTracker::new(),
            close_tx,
        });

        for _ in 0..inner.config.min_workers {
            inner.spawn_executor();
        }

        let manager = Manager::new(Arc::clone(&inner), retire_tx);
        inner.runtime.spawn(manager.run());

        inner.log(PoolEvent::Started {
            min_workers: inner.config.min_workers,
            max_workers: inner.config.max_workers,
        });

        Ok(Self { inner })
    }

    /// Hand `value` to an executor, suspending until one accepts it.
    ///
    /// Does nothing once the pool is closed.
    pub async fn data(&self, ctx: Context, value: I) {
        self.inner.submit(Payload::data(ctx, value)).await;
    }

    /// Hand `error` to an executor, suspending until one accepts it.
    ///
    /// Does nothing once the pool is closed.
    pub async fn error(&self, ctx: Context, error: StageError) {
        self.inner.submit(Payload::error(ctx, error)).await;
    }

    /// Register `stage` as a downstream subscriber and return it for chaining
    pub fn next<S>(&self, stage: S) -> S
    where
        S: Stage<O> + Clone,
    {
        self.inner.subscribers.write().push(Arc::new(stage.clone()));
        stage
    }

    /// Snapshot of the counters.
    ///
    /// `elapsed` is measured from the previous `stats` call on this pool by any
    /// caller. Use [`Pool::sampler`] for an independent baseline.
    pub fn stats(&self) -> Stat {
        self.inner.counters.shared_sample()
    }

    /// Statistics reader with its own elapsed-time baseline
    pub fn sampler(&self) -> StatsSampler {
        StatsSampler::new(Arc::clone(&self.inner.counters))
    }

    /// Stop accepting work, drain every executor, then fire [`Pool::close_notify`].
    ///
    /// Payloads already handed over run to completion and their outcomes reach
    /// the subscribers before the close signal fires, so shutdown waits on
    /// subscribers that are slow to accept. Calls after the first return
    /// immediately.
    pub async fn shutdown(&self) {
        let inner = &self.inner;
        {
            let mut barrier = inner.barrier.lock();
            if inner.closed.swap(true, Ordering::AcqRel) {
                debug!(pool_id = %inner.label.pool_id, "POOL: Shutdown already requested");
                return;
            }
            barrier.take();
        }
        inner.log(PoolEvent::ShutdownStarted);

        // Executors exit once in-flight producers finish and the intake drains
        inner.intake.lock().take();
        inner.manager_stop.cancel();

        let drained = inner.drained.lock().await.take();
        if let Some(mut drained) = drained {
            while drained.recv().await.is_some() {}
        }

        // Downstream must have every outcome before it sees this pool close
        inner.forwards.close();
        inner.forwards.wait().await;

        inner.close_tx.send_replace(true);
        let stat = inner.counters.snapshot(std::time::Duration::ZERO);
        inner.log(PoolEvent::ShutdownComplete {
            closed_executors: stat.closed_executors,
            completed: stat.completed,
        });
    }

    /// Signal fired once shutdown has drained every executor
    pub fn close_notify(&self) -> CloseNotify {
        CloseNotify::new(self.inner.close_tx.subscribe())
    }
}

impl<I, O> Pool<I, O> {
    pub fn id(&self) -> Uuid {
        self.inner.label.pool_id
    }

    pub fn name(&self) -> &str {
        &self.inner.label.name
    }

    pub fn config(&self) -> &PoolConfig {
        &self.inner.config
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.read().len()
    }
}

impl<I, O> fmt::Debug for Pool<I, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("id", &self.inner.label.pool_id)
            .field("name", &self.inner.label.name)
            .field("closed", &self.is_closed())
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

#[async_trait]
impl<I, O> Stage<I> for Pool<I, O>
where
    I: Send + 'static,
    O: Clone + Send + Sync + 'static,
{
    async fn data(&self, ctx: Context, value: I) {
        self.inner.submit(Payload::data(ctx, value)).await;
    }

    async fn error(&self, ctx: Context, error: StageError) {
        self.inner.submit(Payload::error(ctx, error)).await;
    }

    fn close_notify(&self) -> CloseNotify {
        CloseNotify::new(self.inner.close_tx.subscribe())
    }
}

impl<I, O> PoolInner<I, O>
where
    I: Send + 'static,
    O: Clone + Send + Sync + 'static,
{
    async fn submit(&self, payload: Payload<I>) {
        let Some(intake) = self.intake_sender() else {
            debug!(
                pool_id = %self.label.pool_id,
                request_id = %payload.context().request_id(),
                "POOL: Closed, payload ignored"
            );
            return;
        };

        let _pending = Counters::hold(&self.counters.pending);
        if intake.send(payload).await.is_err() {
            debug!(pool_id = %self.label.pool_id, "POOL: Intake closed during handoff");
        }
    }

    fn intake_sender(&self) -> Option<HandoffSender<Payload<I>>> {
        if self.closed.load(Ordering::Acquire) {
            return None;
        }
        self.intake.lock().clone()
    }

    /// Start one executor. Returns false once the pool is closed.
    pub(crate) fn spawn_executor(self: &Arc<Self>) -> bool {
        let barrier = self.barrier.lock();
        let Some(token) = barrier.as_ref().map(mpsc::Sender::clone) else {
            return false;
        };
        let live = self.counters.live.fetch_add(1, Ordering::AcqRel) + 1;
        drop(barrier);

        let executor = Executor::new(Arc::clone(self), token);
        self.log(PoolEvent::ExecutorStarted {
            executor_id: executor.id(),
            live,
        });
        self.runtime.spawn(executor.run());
        true
    }

    pub(crate) fn manager_stop(&self) -> &CancellationToken {
        &self.manager_stop
    }

    /// Send `value` to every subscriber, one task per subscriber
    pub(crate) fn forward_data(&self, ctx: &Context, value: O) {
        for subscriber in self.subscribers.read().iter() {
            let subscriber = Arc::clone(subscriber);
            let ctx = ctx.clone();
            let value = value.clone();
            self.forwards.spawn_on(
                async move {
                    subscriber.data(ctx, value).await;
                },
                &self.runtime,
            );
        }
    }

    /// Send `error` to every subscriber, one task per subscriber. Returns the fan-out width.
    pub(crate) fn forward_error(&self, ctx: &Context, error: StageError) -> usize {
        let subscribers = self.subscribers.read();
        for subscriber in subscribers.iter() {
            let subscriber = Arc::clone(subscriber);
            let ctx = ctx.clone();
            let error = Arc::clone(&error);
            self.forwards.spawn_on(
                async move {
                    subscriber.error(ctx, error).await;
                },
                &self.runtime,
            );
        }
        subscribers.len()
    }
}

impl<I, O> PoolInner<I, O> {
    pub(crate) fn log(&self, event: PoolEvent) {
        self.config.logger.log(&self.label, &event);
    }

    pub(crate) fn log_error(&self, event: PoolEvent) {
        self.config.logger.error(&self.label, &event);
    }
}

#[cfg(test)]
mod tests;
