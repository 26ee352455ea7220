//! # Receive
//!
//! Terminal stages that surface a pipeline's outcomes on plain channels.
//!
//! [`receive`] subscribes a single-executor pool to `upstream` whose handler
//! pushes every data value onto an mpsc channel; [`receive_errors`] does the
//! same for errors. When `upstream` closes, the terminal pool is shut down and
//! the channel is closed, so a `while let Some(v) = rx.recv().await` loop ends
//! on its own.
//!
//! The channel holds a single value. Callers must keep draining it, otherwise
//! upstream shutdown waits on the blocked terminal stage.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

use super::handler::{Handler, HandlerResult};
use super::Pool;
use crate::config::PoolConfig;
use crate::constants::RECEIVE_CHANNEL_CAPACITY;
use crate::context::Context;
use crate::error::{Result, StageError};

/// Which half of each payload a terminal stage surfaces
enum Surface<T> {
    Data(Mutex<Option<mpsc::Sender<T>>>),
    Errors(Mutex<Option<mpsc::Sender<StageError>>>),
}

struct ChannelForwarder<T> {
    surface: Surface<T>,
}

impl<T> ChannelForwarder<T> {
    fn data_sender(&self) -> Option<mpsc::Sender<T>> {
        match &self.surface {
            Surface::Data(tx) => tx.lock().clone(),
            Surface::Errors(_) => None,
        }
    }

    fn error_sender(&self) -> Option<mpsc::Sender<StageError>> {
        match &self.surface {
            Surface::Errors(tx) => tx.lock().clone(),
            Surface::Data(_) => None,
        }
    }

    fn close(&self) {
        match &self.surface {
            Surface::Data(tx) => drop(tx.lock().take()),
            Surface::Errors(tx) => drop(tx.lock().take()),
        }
    }
}

#[async_trait]
impl<T: Send + 'static> Handler<T, ()> for ChannelForwarder<T> {
    async fn handle(
        &self,
        ctx: &Context,
        error: Option<StageError>,
        data: Option<T>,
    ) -> HandlerResult<()> {
        if let (Some(value), Some(tx)) = (data, self.data_sender()) {
            if tx.send(value).await.is_err() {
                debug!(request_id = %ctx.request_id(), "RECEIVE: Receiver dropped, value discarded");
            }
        }
        if let (Some(error), Some(tx)) = (error, self.error_sender()) {
            if tx.send(error).await.is_err() {
                debug!(request_id = %ctx.request_id(), "RECEIVE: Receiver dropped, error discarded");
            }
        }
        Ok(None)
    }
}

/// Surface every data value `upstream` produces on a channel.
///
/// Returns the receiver and the terminal pool. The receiver yields `None`
/// once `upstream` has shut down and every forwarded value was delivered.
pub fn receive<I, O>(upstream: &Pool<I, O>) -> Result<(mpsc::Receiver<O>, Pool<O, ()>)>
where
    I: Send + 'static,
    O: Clone + Send + Sync + 'static,
{
    let (tx, rx) = mpsc::channel(RECEIVE_CHANNEL_CAPACITY);
    let forwarder = ChannelForwarder {
        surface: Surface::Data(Mutex::new(Some(tx))),
    };
    let terminal = attach(upstream, forwarder, "receive")?;
    Ok((rx, terminal))
}

/// Surface every error `upstream` produces on a channel.
///
/// Data values reaching the terminal pool are dropped.
pub fn receive_errors<I, O>(
    upstream: &Pool<I, O>,
) -> Result<(mpsc::Receiver<StageError>, Pool<O, ()>)>
where
    I: Send + 'static,
    O: Clone + Send + Sync + 'static,
{
    let (tx, rx) = mpsc::channel(RECEIVE_CHANNEL_CAPACITY);
    let forwarder = ChannelForwarder {
        surface: Surface::Errors(Mutex::new(Some(tx))),
    };
    let terminal = attach(upstream, forwarder, "receive-errors")?;
    Ok((rx, terminal))
}

fn attach<I, O>(
    upstream: &Pool<I, O>,
    forwarder: ChannelForwarder<O>,
    suffix: &str,
) -> Result<Pool<O, ()>>
where
    I: Send + 'static,
    O: Clone + Send + Sync + 'static,
{
    let forwarder = Arc::new(forwarder);
    let config = PoolConfig {
        name: Some(format!("{}-{}", upstream.name(), suffix)),
        min_workers: 1,
        max_workers: 1,
        skip_errors_to_handler: false,
        ..upstream.config().clone()
    };
    let handler: Arc<dyn Handler<O, ()>> = Arc::clone(&forwarder) as Arc<dyn Handler<O, ()>>;
    let terminal = Pool::with_shared_handler(config, handler)?;
    upstream.next(terminal.clone());

    let upstream_closed = upstream.close_notify();
    let cascade = terminal.clone();
    tokio::spawn(async move {
        upstream_closed.wait().await;
        cascade.shutdown().await;
        forwarder.close();
    });

    Ok(terminal)
}
