//! # Executor
//!
//! One long-lived task per executor. Each loop iteration either takes a
//! scale-down token and exits, or takes one payload from the intake, runs the
//! handler on it and forwards the outcome to every subscriber.
//!
//! Scale-down tokens win ties: the select is biased toward the retire channel
//! so an idle pool sheds executors even while payloads keep trickling in.

use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

use super::payload::Payload;
use super::stats::Counters;
use super::PoolInner;
use crate::logging::PoolEvent;

pub(crate) struct Executor<I, O> {
    id: Uuid,
    pool: Arc<PoolInner<I, O>>,
    /// Held for the executor's lifetime; shutdown waits for every clone to drop
    _barrier: mpsc::Sender<()>,
}

impl<I, O> Executor<I, O>
where
    I: Send + 'static,
    O: Clone + Send + Sync + 'static,
{
    pub(crate) fn new(pool: Arc<PoolInner<I, O>>, barrier: mpsc::Sender<()>) -> Self {
        Self {
            id: Uuid::new_v4(),
            pool,
            _barrier: barrier,
        }
    }

    pub(crate) fn id(&self) -> Uuid {
        self.id
    }

    pub(crate) async fn run(self) {
        let pool = Arc::clone(&self.pool);
        loop {
            tokio::select! {
                biased;

                Some(()) = pool.retire_rx.recv() => {
                    // A token left over from a cancelled scale-down must not cut short the drain
                    if pool.manager_stop().is_cancelled() {
                        continue;
                    }
                    let live = pool.counters.live.fetch_sub(1, Ordering::AcqRel) - 1;
                    pool.log(PoolEvent::ExecutorRetired { executor_id: self.id, live });
                    break;
                }
                payload = pool.intake_rx.recv() => match payload {
                    Some(payload) => self.process(payload).await,
                    None => {
                        pool.counters.live.fetch_sub(1, Ordering::AcqRel);
                        pool.log(PoolEvent::ExecutorExited { executor_id: self.id });
                        break;
                    }
                },
            }
        }
        pool.counters.closed_executors.fetch_add(1, Ordering::AcqRel);
    }

    async fn process(&self, payload: Payload<I>) {
        let pool = &self.pool;
        let _active = Counters::hold(&pool.counters.active);
        let (ctx, error, data) = payload.into_parts();
        let request_id = ctx.request_id();

        pool.log(PoolEvent::PayloadAccepted {
            executor_id: self.id,
            request_id,
            has_error: error.is_some(),
        });

        if pool.config.skip_errors_to_handler {
            if let Some(error) = error {
                let subscribers = pool.forward_error(&ctx, error);
                pool.log(PoolEvent::ErrorSkipped {
                    executor_id: self.id,
                    request_id,
                    subscribers,
                });
                return;
            }
        }

        let outcome = AssertUnwindSafe(pool.handler.handle(&ctx, error, data))
            .catch_unwind()
            .await;

        match outcome {
            Ok(result) => {
                pool.counters.completed.fetch_add(1, Ordering::AcqRel);
                match result {
                    Ok(Some(value)) => pool.forward_data(&ctx, value),
                    Ok(None) => {}
                    Err(error) => {
                        pool.log(PoolEvent::HandlerFailed {
                            executor_id: self.id,
                            request_id,
                            error: error.to_string(),
                        });
                        pool.forward_error(&ctx, error);
                    }
                }
            }
            Err(panic) => {
                pool.log_error(PoolEvent::HandlerPanicked {
                    executor_id: self.id,
                    request_id,
                    message: panic_message(panic.as_ref()),
                });
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}
