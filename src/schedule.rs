//! # Polling Schedules
//!
//! A schedule maps the manager's current polling interval to the next one.
//! The manager applies its *choke* schedule after a tick that grew the pool
//! and its *relax* schedule otherwise.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::constants::MIN_RELAXED_INTERVAL;

/// Interval transformation applied between manager ticks
pub type Schedule = Arc<dyn Fn(Duration) -> Duration + Send + Sync>;

/// Keep the interval unchanged
pub fn constant() -> Schedule {
    Arc::new(|current: Duration| current)
}

/// Add a fixed step each tick
pub fn linear(step: Duration) -> Schedule {
    Arc::new(move |current: Duration| current.saturating_add(step))
}

/// Multiply by `factor` each tick. Non-finite or negative factors keep the interval.
pub fn exponential(factor: f64) -> Schedule {
    Arc::new(move |current: Duration| {
        if !factor.is_finite() || factor < 0.0 {
            return current;
        }
        Duration::try_from_secs_f64(current.as_secs_f64() * factor).unwrap_or(Duration::MAX)
    })
}

/// Double the interval each tick
pub fn doubling() -> Schedule {
    Arc::new(|current: Duration| current.saturating_mul(2))
}

/// Halve the interval each tick, never going below `floor`
pub fn halving(floor: Duration) -> Schedule {
    Arc::new(move |current: Duration| (current / 2).max(floor))
}

/// Default choke schedule
pub fn default_choke() -> Schedule {
    doubling()
}

/// Default relax schedule
pub fn default_relax() -> Schedule {
    halving(MIN_RELAXED_INTERVAL)
}

/// Serializable description of a schedule, used by file and env settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScheduleSpec {
    Constant,
    Linear { step_ms: u64 },
    Exponential { factor: f64 },
    Doubling,
    Halving { floor_ms: u64 },
}

impl ScheduleSpec {
    pub fn build(&self) -> Schedule {
        match self {
            ScheduleSpec::Constant => constant(),
            ScheduleSpec::Linear { step_ms } => linear(Duration::from_millis(*step_ms)),
            ScheduleSpec::Exponential { factor } => exponential(*factor),
            ScheduleSpec::Doubling => doubling(),
            ScheduleSpec::Halving { floor_ms } => halving(Duration::from_millis(*floor_ms)),
        }
    }
}
