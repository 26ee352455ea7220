//! Rendezvous channel shared by many receivers.
//!
//! `send` completes only once a receiver has taken the value, which is what
//! gives pool intake its backpressure and makes scale-down tokens land on an
//! executor that is actually idle. Receivers share one underlying queue behind
//! a fair async mutex, so waiting executors are served in FIFO order.

use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, Mutex};

type Envelope<T> = (T, oneshot::Sender<()>);

pub(crate) fn handoff<T>() -> (HandoffSender<T>, HandoffReceiver<T>) {
    let (tx, rx) = mpsc::channel(1);
    (
        HandoffSender { tx },
        HandoffReceiver {
            rx: Arc::new(Mutex::new(rx)),
        },
    )
}

pub(crate) struct HandoffSender<T> {
    tx: mpsc::Sender<Envelope<T>>,
}

impl<T> Clone for HandoffSender<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<T> HandoffSender<T> {
    /// Wait until a receiver takes `value`. Gives the value back if every receiver is gone.
    pub(crate) async fn send(&self, value: T) -> Result<(), T> {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.tx
            .send((value, ack_tx))
            .await
            .map_err(|mpsc::error::SendError((value, _))| value)?;
        // Receivers ack in the same poll that dequeues; a dropped ack still means taken
        let _ = ack_rx.await;
        Ok(())
    }
}

pub(crate) struct HandoffReceiver<T> {
    rx: Arc<Mutex<mpsc::Receiver<Envelope<T>>>>,
}

impl<T> Clone for HandoffReceiver<T> {
    fn clone(&self) -> Self {
        Self {
            rx: Arc::clone(&self.rx),
        }
    }
}

impl<T> HandoffReceiver<T> {
    /// Take the next value. `None` once every sender is dropped and the queue is drained.
    ///
    /// Cancel safe: nothing is taken unless the call completes.
    pub(crate) async fn recv(&self) -> Option<T> {
        let mut rx = self.rx.lock().await;
        let (value, ack) = rx.recv().await?;
        let _ = ack.send(());
        Some(value)
    }
}
