//! Shared helpers for pool integration tests
#![allow(dead_code)]

use parking_lot::Mutex;
use stagepool::prelude::*;
use stagepool::{Logger, PoolEvent, PoolLabel, StageError};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};
use tracing::Level;

pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .with_test_writer()
        .try_init();
}

/// Fast-ticking config so manager behavior shows up within a test's lifetime
pub fn test_config(name: &str, min: usize, max: usize) -> PoolConfig {
    PoolConfig::builder()
        .name(name)
        .min_workers(min)
        .max_workers(max)
        .check_interval(Duration::from_millis(10))
        .max_check_interval(Duration::from_millis(100))
        .build()
        .expect("test config is valid")
}

/// Passes values through, rethrows incoming errors
pub fn identity<T: Send + 'static>() -> impl Handler<T, T> {
    handler_fn(|_ctx: &Context, err: Option<StageError>, data: Option<T>| match err {
        Some(e) => Err(e),
        None => Ok(data),
    })
}

/// Handler that waits for a permit before returning each value
pub fn gated<T: Send + 'static>(gate: Arc<Semaphore>) -> impl Handler<T, T> {
    async_handler_fn(move |_ctx: Context, _err, data: Option<T>| {
        let gate = Arc::clone(&gate);
        async move {
            gate.acquire().await.expect("gate open").forget();
            Ok::<_, StageError>(data)
        }
    })
}

/// Handler that sleeps before returning each value
pub fn delayed<T: Send + 'static>(delay: Duration) -> impl Handler<T, T> {
    async_handler_fn(move |_ctx: Context, _err, data: Option<T>| async move {
        tokio::time::sleep(delay).await;
        Ok::<_, StageError>(data)
    })
}

/// Logger that keeps every event it sees
#[derive(Default)]
pub struct RecordingLogger {
    pub events: Mutex<Vec<PoolEvent>>,
    pub errors: Mutex<Vec<PoolEvent>>,
}

impl RecordingLogger {
    pub fn count(&self, matches: impl Fn(&PoolEvent) -> bool) -> usize {
        self.events.lock().iter().filter(|e| matches(e)).count()
    }

    pub fn error_count(&self) -> usize {
        self.errors.lock().len()
    }
}

impl Logger for RecordingLogger {
    fn log(&self, _pool: &PoolLabel, event: &PoolEvent) {
        self.events.lock().push(event.clone());
    }

    fn error(&self, _pool: &PoolLabel, event: &PoolEvent) {
        self.errors.lock().push(event.clone());
    }
}

/// Drain a receiver until it closes
pub async fn collect<T>(mut rx: mpsc::Receiver<T>) -> Vec<T> {
    let mut out = Vec::new();
    while let Some(value) = rx.recv().await {
        out.push(value);
    }
    out
}

/// Poll `check` until it holds or two seconds pass
pub async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}
