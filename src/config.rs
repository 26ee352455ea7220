//! # Pool Configuration
//!
//! [`PoolConfig`] is the in-memory configuration a pool is built from. It holds
//! the executor bounds, the manager's polling schedules and the logger sink.
//!
//! [`PoolSettings`] is the serializable subset of it, loadable from a settings
//! file and `STAGEPOOL_*` environment variables through the `config` crate.
//!
//! ```rust,no_run
//! use stagepool::config::{PoolConfig, PoolSettings};
//! use std::time::Duration;
//!
//! # fn main() -> stagepool::Result<()> {
//! let built = PoolConfig::builder()
//!     .name("resize")
//!     .min_workers(2)
//!     .max_workers(16)
//!     .check_interval(Duration::from_millis(50))
//!     .build()?;
//!
//! let loaded = PoolSettings::load(Some("stagepool.toml"))?.into_config()?;
//! # let _ = (built, loaded);
//! # Ok(())
//! # }
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::constants::{
    default_max_workers, DEFAULT_CHECK_INTERVAL, DEFAULT_MAX_CHECK_INTERVAL, DEFAULT_MIN_WORKERS,
    SETTINGS_ENV_PREFIX,
};
use crate::error::{PoolError, Result};
use crate::logging::{default_logger, Logger};
use crate::schedule::{self, Schedule, ScheduleSpec};

/// Configuration for one pool
#[derive(Clone)]
pub struct PoolConfig {
    /// Label used in log events; defaults to a short form of the pool id
    pub name: Option<String>,
    /// Executors kept alive at all times (at least 1)
    pub min_workers: usize,
    /// Upper bound on live executors
    pub max_workers: usize,
    /// Forward error payloads downstream without invoking the handler
    pub skip_errors_to_handler: bool,
    /// Applied to the polling interval after a tick that did not grow the pool
    pub relax_schedule: Schedule,
    /// Applied to the polling interval after a tick that grew the pool
    pub choke_schedule: Schedule,
    /// Initial polling interval, and the value it resets to
    pub check_interval: Duration,
    /// Intervals beyond this reset to `check_interval`
    pub max_check_interval: Duration,
    /// Event sink
    pub logger: Arc<dyn Logger>,
}

impl PoolConfig {
    pub fn builder() -> PoolConfigBuilder {
        PoolConfigBuilder::default()
    }

    /// Check every bound the pool relies on
    pub fn validate(&self) -> Result<()> {
        if self.min_workers < 1 {
            return Err(PoolError::InvalidConfiguration(
                "min_workers must be at least 1".to_string(),
            ));
        }
        if self.max_workers < self.min_workers {
            return Err(PoolError::InvalidConfiguration(format!(
                "max_workers ({}) must be >= min_workers ({})",
                self.max_workers, self.min_workers
            )));
        }
        if self.check_interval.is_zero() {
            return Err(PoolError::InvalidConfiguration(
                "check_interval must be greater than zero".to_string(),
            ));
        }
        if self.max_check_interval < self.check_interval {
            return Err(PoolError::InvalidConfiguration(format!(
                "max_check_interval ({:?}) must be >= check_interval ({:?})",
                self.max_check_interval, self.check_interval
            )));
        }
        Ok(())
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            name: None,
            min_workers: DEFAULT_MIN_WORKERS,
            max_workers: default_max_workers(),
            skip_errors_to_handler: false,
            relax_schedule: schedule::default_relax(),
            choke_schedule: schedule::default_choke(),
            check_interval: DEFAULT_CHECK_INTERVAL,
            max_check_interval: DEFAULT_MAX_CHECK_INTERVAL,
            logger: default_logger(),
        }
    }
}

impl fmt::Debug for PoolConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolConfig")
            .field("name", &self.name)
            .field("min_workers", &self.min_workers)
            .field("max_workers", &self.max_workers)
            .field("skip_errors_to_handler", &self.skip_errors_to_handler)
            .field("check_interval", &self.check_interval)
            .field("max_check_interval", &self.max_check_interval)
            .field("relax_schedule", &"Fn(Duration) -> Duration")
            .field("choke_schedule", &"Fn(Duration) -> Duration")
            .field("logger", &"Logger")
            .finish()
    }
}

/// Builder for [`PoolConfig`]; `build` validates
#[derive(Debug, Clone, Default)]
pub struct PoolConfigBuilder {
    config: PoolConfig,
}

impl PoolConfigBuilder {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = Some(name.into());
        self
    }

    pub fn min_workers(mut self, min_workers: usize) -> Self {
        self.config.min_workers = min_workers;
        self
    }

    pub fn max_workers(mut self, max_workers: usize) -> Self {
        self.config.max_workers = max_workers;
        self
    }

    pub fn skip_errors_to_handler(mut self, skip: bool) -> Self {
        self.config.skip_errors_to_handler = skip;
        self
    }

    pub fn relax_schedule(mut self, schedule: Schedule) -> Self {
        self.config.relax_schedule = schedule;
        self
    }

    pub fn choke_schedule(mut self, schedule: Schedule) -> Self {
        self.config.choke_schedule = schedule;
        self
    }

    pub fn check_interval(mut self, interval: Duration) -> Self {
        self.config.check_interval = interval;
        self
    }

    pub fn max_check_interval(mut self, interval: Duration) -> Self {
        self.config.max_check_interval = interval;
        self
    }

    pub fn logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.config.logger = logger;
        self
    }

    pub fn build(self) -> Result<PoolConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Serializable pool settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolSettings {
    pub name: Option<String>,
    pub min_workers: usize,
    pub max_workers: usize,
    pub skip_errors_to_handler: bool,
    pub check_interval_ms: u64,
    pub max_check_interval_ms: u64,
    /// Overrides the default relax schedule
    pub relax_schedule: Option<ScheduleSpec>,
    /// Overrides the default choke schedule
    pub choke_schedule: Option<ScheduleSpec>,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            name: None,
            min_workers: DEFAULT_MIN_WORKERS,
            max_workers: default_max_workers(),
            skip_errors_to_handler: false,
            check_interval_ms: DEFAULT_CHECK_INTERVAL.as_millis() as u64,
            max_check_interval_ms: DEFAULT_MAX_CHECK_INTERVAL.as_millis() as u64,
            relax_schedule: None,
            choke_schedule: None,
        }
    }
}

impl PoolSettings {
    /// Load settings from an optional file, then apply `STAGEPOOL_*` environment overrides.
    ///
    /// A missing file is not an error; defaults fill every absent key.
    pub fn load<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            debug!(path = %path.as_ref().display(), "CONFIG: Loading pool settings file");
            builder = builder.add_source(config::File::from(path.as_ref()).required(false));
        }
        let settings = builder
            .add_source(config::Environment::with_prefix(SETTINGS_ENV_PREFIX).try_parsing(true))
            .build()?
            .try_deserialize::<PoolSettings>()?;
        Ok(settings)
    }

    /// Parse settings from an in-memory TOML document
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from_str(contents, config::FileFormat::Toml))
            .build()?
            .try_deserialize::<PoolSettings>()?;
        Ok(settings)
    }

    /// Convert into a validated [`PoolConfig`] using the default logger
    pub fn into_config(self) -> Result<PoolConfig> {
        let mut builder = PoolConfig::builder()
            .min_workers(self.min_workers)
            .max_workers(self.max_workers)
            .skip_errors_to_handler(self.skip_errors_to_handler)
            .check_interval(Duration::from_millis(self.check_interval_ms))
            .max_check_interval(Duration::from_millis(self.max_check_interval_ms));
        if let Some(name) = self.name {
            builder = builder.name(name);
        }
        if let Some(spec) = self.relax_schedule {
            builder = builder.relax_schedule(spec.build());
        }
        if let Some(spec) = self.choke_schedule {
            builder = builder.choke_schedule(spec.build());
        }
        builder.build()
    }
}
