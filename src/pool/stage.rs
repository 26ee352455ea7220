//! The contract one pipeline stage exposes to its upstream neighbors.

use async_trait::async_trait;
use tokio::sync::watch;

use crate::context::Context;
use crate::error::StageError;

/// Anything a pool can forward outcomes to
#[async_trait]
pub trait Stage<T: Send + 'static>: Send + Sync + 'static {
    /// Hand over a value; suspends until the stage accepts it
    async fn data(&self, ctx: Context, value: T);

    /// Hand over an error; suspends until the stage accepts it
    async fn error(&self, ctx: Context, error: StageError);

    /// Signal fired once this stage has fully shut down
    fn close_notify(&self) -> CloseNotify;
}

/// One-shot signal fired after a pool has drained every executor on shutdown.
///
/// Cloneable; every clone observes the same firing.
#[derive(Debug, Clone)]
pub struct CloseNotify {
    rx: watch::Receiver<bool>,
}

impl CloseNotify {
    pub(crate) fn new(rx: watch::Receiver<bool>) -> Self {
        Self { rx }
    }

    pub fn is_fired(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once the signal has fired, immediately if it already has.
    ///
    /// Also resolves if the owning pool is dropped without shutting down.
    pub async fn wait(&self) {
        let mut rx = self.rx.clone();
        let _ = rx.wait_for(|fired| *fired).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_wait_after_fire_is_immediate() {
        let (tx, rx) = watch::channel(false);
        let signal = CloseNotify::new(rx);
        assert!(!signal.is_fired());

        tx.send_replace(true);
        assert!(signal.is_fired());
        tokio::time::timeout(Duration::from_millis(100), signal.wait())
            .await
            .expect("already fired");
    }

    #[tokio::test]
    async fn test_clones_observe_same_firing() {
        let (tx, rx) = watch::channel(false);
        let signal = CloseNotify::new(rx);
        let waiter = signal.clone();
        let handle = tokio::spawn(async move { waiter.wait().await });

        tx.send_replace(true);
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("waiter should wake")
            .unwrap();
    }

    #[tokio::test]
    async fn test_dropped_sender_releases_waiters() {
        let (tx, rx) = watch::channel(false);
        let signal = CloseNotify::new(rx);
        drop(tx);
        tokio::time::timeout(Duration::from_millis(100), signal.wait())
            .await
            .expect("closed channel should not hang");
        assert!(!signal.is_fired());
    }
}
