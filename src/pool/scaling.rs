//! # Auto-Scaling Decisions
//!
//! Pure functions behind the manager loop. Given statistics samples and the
//! pool bounds they decide how many executors to retire or start, and what
//! the next polling interval is.
//!
//! Shrinking is aggressive: as soon as live executors outnumber blocked
//! producers the pool heads back toward its floor. Growth is proactive: when
//! pressure persists across two samples the estimated shortfall is doubled,
//! as long as the doubled figure stays under the ceiling, so bursts saturate
//! quickly instead of being chased one executor at a time.

use serde::Serialize;
use std::time::Duration;

use super::stats::Stat;
use crate::config::PoolConfig;

/// Outcome of one manager tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ScalingDecision {
    /// Retire this many executors
    Shrink { count: usize },
    /// Start this many executors
    Grow { count: usize },
    /// Leave the pool as is
    Hold,
}

/// Evaluate the shrink branch.
///
/// Returns `None` when live executors do not outnumber pending producers,
/// meaning the grow branch applies instead. `Some(0)` means the pool already
/// sits at its floor.
pub fn plan_shrink(sample: &Stat, min_workers: usize) -> Option<usize> {
    let live = sample.live_executors;
    let pending = sample.pending;
    if live <= pending {
        return None;
    }

    let excess = live - pending;
    let count = if pending < 1 && excess > min_workers {
        excess - min_workers
    } else if pending > min_workers {
        excess
    } else {
        live.saturating_sub(min_workers)
    };
    Some(count)
}

/// Evaluate the grow branch from two consecutive samples.
///
/// Growth happens only if pressure persisted or worsened between the samples.
/// The result never takes the pool past `max_workers`.
pub fn plan_growth(first: &Stat, second: &Stat, max_workers: usize) -> usize {
    let persisted = second.pending >= first.pending;
    let overloaded = second.live_executors < second.pending;
    if !(persisted || overloaded) {
        return 0;
    }

    let mut load = second
        .live_executors
        .abs_diff(second.pending)
        .min(max_workers);
    if load.saturating_mul(2) < max_workers {
        load *= 2;
    }
    load.min(max_workers.saturating_sub(second.live_executors))
}

/// Next polling interval and whether it was reset to the configured base
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntervalStep {
    pub interval: Duration,
    pub reset: bool,
}

/// Apply the choke schedule after growth, the relax schedule otherwise.
///
/// Results beyond `max_check_interval`, or zero, fall back to `check_interval`.
pub fn next_interval(current: Duration, grew: bool, config: &PoolConfig) -> IntervalStep {
    let proposed = if grew {
        (config.choke_schedule)(current)
    } else {
        (config.relax_schedule)(current)
    };

    if proposed > config.max_check_interval || proposed.is_zero() {
        IntervalStep {
            interval: config.check_interval,
            reset: true,
        }
    } else {
        IntervalStep {
            interval: proposed,
            reset: false,
        }
    }
}
