//! # Pool Statistics
//!
//! Lock-free counters updated on the payload hot path, and the [`Stat`]
//! snapshots read from them. Counters are independent atomics: a snapshot is
//! best-effort, not a transaction. Under a concurrent scale-down a snapshot may
//! briefly show more active than live executors.

use chrono::{DateTime, Utc};
use crossbeam::utils::CachePadded;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Point-in-time view of a pool's counters
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Stat {
    /// Executors currently alive
    pub live_executors: usize,
    /// Executors currently inside a handler call
    pub active_executors: usize,
    /// Callers blocked handing a payload to the intake
    pub pending: usize,
    /// Handler invocations that returned (panics excluded)
    pub completed: usize,
    /// Executors that have exited, by scale-down or shutdown
    pub closed_executors: usize,
    pub sampled_at: DateTime<Utc>,
    /// Wall-clock time since the previous sample taken from the same baseline
    pub elapsed: Duration,
}

impl Stat {
    /// Share of live executors busy in a handler, in `0.0..=1.0`
    pub fn utilization(&self) -> f64 {
        if self.live_executors == 0 {
            return 0.0;
        }
        (self.active_executors as f64 / self.live_executors as f64).min(1.0)
    }

    pub fn idle_executors(&self) -> usize {
        self.live_executors.saturating_sub(self.active_executors)
    }
}

/// Shared counters for one pool
#[derive(Debug)]
pub(crate) struct Counters {
    pub(crate) live: CachePadded<AtomicUsize>,
    pub(crate) active: CachePadded<AtomicUsize>,
    pub(crate) pending: CachePadded<AtomicUsize>,
    pub(crate) completed: CachePadded<AtomicUsize>,
    pub(crate) closed_executors: CachePadded<AtomicUsize>,
    origin: Instant,
    last_sample_nanos: AtomicU64,
}

impl Counters {
    pub(crate) fn new() -> Self {
        Self {
            live: CachePadded::new(AtomicUsize::new(0)),
            active: CachePadded::new(AtomicUsize::new(0)),
            pending: CachePadded::new(AtomicUsize::new(0)),
            completed: CachePadded::new(AtomicUsize::new(0)),
            closed_executors: CachePadded::new(AtomicUsize::new(0)),
            origin: Instant::now(),
            last_sample_nanos: AtomicU64::new(0),
        }
    }

    pub(crate) fn live(&self) -> usize {
        self.live.load(Ordering::Acquire)
    }

    /// Read every counter, stamping the snapshot with `elapsed`
    pub(crate) fn snapshot(&self, elapsed: Duration) -> Stat {
        Stat {
            live_executors: self.live.load(Ordering::Acquire),
            active_executors: self.active.load(Ordering::Acquire),
            pending: self.pending.load(Ordering::Acquire),
            completed: self.completed.load(Ordering::Acquire),
            closed_executors: self.closed_executors.load(Ordering::Acquire),
            sampled_at: Utc::now(),
            elapsed,
        }
    }

    /// Snapshot against the pool-wide baseline, moving the baseline forward
    pub(crate) fn shared_sample(&self) -> Stat {
        let now = self.nanos_since_origin();
        let previous = self.last_sample_nanos.swap(now, Ordering::AcqRel);
        self.snapshot(Duration::from_nanos(now.saturating_sub(previous)))
    }

    fn nanos_since_origin(&self) -> u64 {
        u64::try_from(self.origin.elapsed().as_nanos()).unwrap_or(u64::MAX)
    }

    /// Increment `gauge` until the returned guard drops
    pub(crate) fn hold(gauge: &AtomicUsize) -> GaugeGuard<'_> {
        gauge.fetch_add(1, Ordering::AcqRel);
        GaugeGuard { gauge }
    }
}

/// Decrements its gauge on drop, so cancelled futures leave counters balanced
pub(crate) struct GaugeGuard<'a> {
    gauge: &'a AtomicUsize,
}

impl Drop for GaugeGuard<'_> {
    fn drop(&mut self) {
        self.gauge.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Statistics reader with its own elapsed-time baseline.
///
/// `Pool::stats` shares one baseline between every caller, so two independent
/// readers skew each other's `elapsed`. A sampler keeps a private one.
#[derive(Debug)]
pub struct StatsSampler {
    counters: Arc<Counters>,
    last: Instant,
}

impl StatsSampler {
    pub(crate) fn new(counters: Arc<Counters>) -> Self {
        Self {
            counters,
            last: Instant::now(),
        }
    }

    pub fn sample(&mut self) -> Stat {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last);
        self.last = now;
        self.counters.snapshot(elapsed)
    }
}
