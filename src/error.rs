//! # Error Types
//!
//! Two families of errors live here. [`PoolError`] covers failures of the pool
//! machinery itself (bad configuration, no runtime to spawn onto, unreadable
//! settings). [`StageError`] is the error *value* that travels through a
//! pipeline next to the data: handlers return it, pools forward it to their
//! subscribers' error entry points.

use std::fmt;
use std::sync::Arc;

/// Errors raised while building or configuring a pool
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    /// The supplied configuration violates a bound
    #[error("Invalid pool configuration: {0}")]
    InvalidConfiguration(String),

    /// Pools spawn their executors onto the ambient Tokio runtime
    #[error("No Tokio runtime available: pools must be created from within a runtime")]
    NoRuntime,

    /// Settings could not be loaded or deserialized
    #[error("Settings error: {0}")]
    Settings(#[from] config::ConfigError),
}

pub type Result<T> = std::result::Result<T, PoolError>;

/// Error value carried through a pipeline.
///
/// Reference counted so one failure can be fanned out to any number of
/// downstream stages without requiring the underlying error to be `Clone`.
pub type StageError = Arc<dyn std::error::Error + Send + Sync + 'static>;

/// Wrap any error into a [`StageError`]
pub fn stage_error<E>(error: E) -> StageError
where
    E: std::error::Error + Send + Sync + 'static,
{
    Arc::new(error)
}

/// Build a [`StageError`] from a plain message
pub fn message_error(message: impl Into<String>) -> StageError {
    Arc::new(MessageError(message.into()))
}

/// Error carrying nothing but a message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageError(pub String);

impl fmt::Display for MessageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for MessageError {}
