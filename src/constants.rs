//! # Pool Defaults
//!
//! Default bounds and timings applied when a pool is configured without
//! explicit values.

use std::time::Duration;

/// Executors started when a pool is created
pub const DEFAULT_MIN_WORKERS: usize = 1;

/// Initial manager polling period
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_millis(100);

/// Polling period above which the manager resets to its initial period
pub const DEFAULT_MAX_CHECK_INTERVAL: Duration = Duration::from_secs(5);

/// Smallest period the default relax schedule will shrink to
pub const MIN_RELAXED_INTERVAL: Duration = Duration::from_millis(1);

/// Capacity of each terminal channel built by `receive` helpers
pub const RECEIVE_CHANNEL_CAPACITY: usize = 1;

/// Prefix for environment variable overrides of pool settings
pub const SETTINGS_ENV_PREFIX: &str = "STAGEPOOL";

/// Upper executor bound when none is configured: one per available core
pub fn default_max_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(DEFAULT_MIN_WORKERS)
        .max(DEFAULT_MIN_WORKERS)
}
