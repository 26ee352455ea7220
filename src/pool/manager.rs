//! # Manager
//!
//! The per-pool control loop. Every tick it samples the counters and either
//! retires surplus executors or, when pressure persists across a second
//! sample, starts more. The polling interval tightens after growth (choke
//! schedule) and loosens otherwise (relax schedule).
//!
//! The manager stops when the pool's stop token is cancelled, which shutdown
//! does before draining executors.

use std::sync::Arc;
use std::time::Duration;
use tracing::trace;

use super::handoff::HandoffSender;
use super::scaling::{next_interval, plan_growth, plan_shrink, ScalingDecision};
use super::stats::StatsSampler;
use super::PoolInner;
use crate::logging::PoolEvent;

pub(crate) struct Manager<I, O> {
    pool: Arc<PoolInner<I, O>>,
    retire: HandoffSender<()>,
    sampler: StatsSampler,
    interval: Duration,
}

impl<I, O> Manager<I, O>
where
    I: Send + 'static,
    O: Clone + Send + Sync + 'static,
{
    pub(crate) fn new(pool: Arc<PoolInner<I, O>>, retire: HandoffSender<()>) -> Self {
        let sampler = StatsSampler::new(Arc::clone(&pool.counters));
        let interval = pool.config.check_interval;
        Self {
            pool,
            retire,
            sampler,
            interval,
        }
    }

    pub(crate) async fn run(mut self) {
        let stop = self.pool.manager_stop().clone();
        loop {
            tokio::select! {
                _ = stop.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
            let decision = self.tick().await;
            trace!(
                pool_id = %self.pool.label.pool_id,
                decision = ?decision,
                interval_ms = self.interval.as_millis() as u64,
                "MANAGER: Tick"
            );
        }
        trace!(pool_id = %self.pool.label.pool_id, "MANAGER: Stopped");
    }

    async fn tick(&mut self) -> ScalingDecision {
        let first = self.sampler.sample();

        if let Some(count) = plan_shrink(&first, self.pool.config.min_workers) {
            // The interval is left alone on a shrink tick
            if count == 0 {
                return ScalingDecision::Hold;
            }
            let retired = self.retire(count).await;
            if retired > 0 {
                self.pool.log(PoolEvent::ScaledDown {
                    count: retired,
                    live: self.pool.counters.live(),
                    pending: first.pending,
                });
            }
            return ScalingDecision::Shrink { count: retired };
        }

        let second = self.sampler.sample();
        let max_workers = self.pool.config.max_workers;
        let planned = plan_growth(&first, &second, max_workers);
        let room = max_workers.saturating_sub(self.pool.counters.live());
        let mut started = 0;
        for _ in 0..planned.min(room) {
            if !self.pool.spawn_executor() {
                break;
            }
            started += 1;
        }
        if started > 0 {
            self.pool.log(PoolEvent::ScaledUp {
                count: started,
                live: self.pool.counters.live(),
                pending: second.pending,
            });
        }

        let step = next_interval(self.interval, started > 0, &self.pool.config);
        if step.interval != self.interval {
            self.pool.log(PoolEvent::IntervalChanged {
                from_ms: self.interval.as_millis() as u64,
                to_ms: step.interval.as_millis() as u64,
                reset: step.reset,
            });
            self.interval = step.interval;
        }

        if started > 0 {
            ScalingDecision::Grow { count: started }
        } else {
            ScalingDecision::Hold
        }
    }

    /// Hand out up to `count` scale-down tokens, one idle executor each
    async fn retire(&self, count: usize) -> usize {
        let stop = self.pool.manager_stop();
        let mut retired = 0;
        for _ in 0..count {
            tokio::select! {
                _ = stop.cancelled() => break,
                sent = self.retire.send(()) => {
                    if sent.is_err() {
                        break;
                    }
                    retired += 1;
                }
            }
        }
        retired
    }
}
