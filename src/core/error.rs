//! Error types and handling for the bridge server.
//!
//! Each layer owns a focused error enum; this module aggregates them into a
//! single [`Error`] for callers that drive the whole server.

use thiserror::Error;

use super::lifecycle::LifecycleError;
use super::rate_limit::RateLimitError;
use super::transport::TransportError;

/// A specialized Result type for bridge server operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for the bridge server.
#[derive(Debug, Error)]
pub enum Error {
    /// Error originating from the tools domain.
    #[error("Tool error: {0}")]
    Tool(#[from] crate::domains::tools::ToolError),

    #[error("Rate limit error: {0}")]
    RateLimit(#[from] RateLimitError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Lifecycle error: {0}")]
    Lifecycle(#[from] LifecycleError),

    /// Metrics registry errors.
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    /// Configuration-related errors.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Create a new configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
