//! # Request Context
//!
//! The request-scoped handle that rides along with every payload. Pools never
//! inspect it; handlers and callers use it to correlate work and to observe
//! cancellation.

use chrono::{DateTime, Utc};
use std::fmt;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Cancelable, request-scoped context passed through a pipeline unopened
#[derive(Clone)]
pub struct Context {
    request_id: Uuid,
    created_at: DateTime<Utc>,
    token: CancellationToken,
}

impl Context {
    /// Create a fresh root context with a new request id
    pub fn new() -> Self {
        Self::with_request_id(Uuid::new_v4())
    }

    /// Create a root context for an existing request id
    pub fn with_request_id(request_id: Uuid) -> Self {
        Self {
            request_id,
            created_at: Utc::now(),
            token: CancellationToken::new(),
        }
    }

    /// Derive a context sharing this request id whose cancellation follows the parent.
    ///
    /// Cancelling the child does not cancel the parent.
    pub fn child(&self) -> Self {
        Self {
            request_id: self.request_id,
            created_at: Utc::now(),
            token: self.token.child_token(),
        }
    }

    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Cancel this context and every child derived from it
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once the context is cancelled
    pub async fn cancelled(&self) {
        self.token.cancelled().await;
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("request_id", &self.request_id)
            .field("created_at", &self.created_at)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
