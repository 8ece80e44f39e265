//! Lifecycle error types.

use std::time::Duration;

use thiserror::Error;

use crate::core::transport::TransportError;

/// Result type for lifecycle operations.
pub type LifecycleResult<T> = Result<T, LifecycleError>;

/// Errors raised while running or stopping the server.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// A drain or shutdown phase exceeded its deadline.
    #[error("{phase} deadline of {timeout:?} exceeded")]
    Timeout {
        phase: &'static str,
        timeout: Duration,
    },

    /// A shutdown hook returned an error.
    #[error("shutdown hook '{name}' failed: {source}")]
    HookFailed {
        name: String,
        #[source]
        source: anyhow::Error,
    },

    /// The transport stopped with an error.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The transport task panicked or was aborted.
    #[error("transport task failed: {0}")]
    TaskFailed(String),
}

impl LifecycleError {
    pub fn timeout(phase: &'static str, timeout: Duration) -> Self {
        Self::Timeout { phase, timeout }
    }

    /// True for deadline-exceeded conditions.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}
