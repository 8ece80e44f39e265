//! Rate limiting error types.

use std::time::Duration;

use thiserror::Error;

/// Errors produced by token buckets and rate gates.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RateLimitError {
    /// The gate was constructed with unusable parameters.
    #[error("invalid rate limit configuration: {0}")]
    InvalidConfig(String),

    /// No token is available right now.
    #[error("rate limit exceeded, retry after {retry_after:?}")]
    Exhausted { retry_after: Duration },

    /// The caller's context was cancelled while waiting for a token.
    #[error("cancelled while waiting for a rate limit token")]
    Cancelled,
}

impl RateLimitError {
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }
}
