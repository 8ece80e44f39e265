//! Tool-specific error types.

use thiserror::Error;

use crate::core::rate_limit::RateLimitError;

/// Opaque failure returned by a tool handler.
///
/// The dispatcher never inspects or rewraps it; callers see exactly what the
/// handler produced.
#[derive(Debug, Error)]
#[error(transparent)]
pub struct HandlerError(#[from] anyhow::Error);

impl HandlerError {
    /// Create a handler error from a plain message.
    pub fn msg(msg: impl std::fmt::Display + std::fmt::Debug + Send + Sync + 'static) -> Self {
        Self(anyhow::Error::msg(msg))
    }
}

/// Errors that can occur during tool registration and execution.
#[derive(Debug, Error)]
pub enum ToolError {
    /// The tool definition or its arguments are malformed.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A tool with the same name is already registered.
    #[error("tool already registered: {0}")]
    DuplicateTool(String),

    /// The requested tool was not found.
    #[error("tool not found: {0}")]
    NotFound(String),

    /// The per-tool rate gate refused or abandoned the call.
    #[error("rate limit for tool {tool}: {source}")]
    RateLimited {
        tool: String,
        #[source]
        source: RateLimitError,
    },

    /// The call was cancelled before the handler finished.
    #[error("tool execution cancelled: {0}")]
    Cancelled(String),

    /// The handler itself failed.
    #[error(transparent)]
    Handler(#[from] HandlerError),
}

impl ToolError {
    /// Create a new validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a new "not found" error.
    pub fn not_found(name: impl Into<String>) -> Self {
        Self::NotFound(name.into())
    }

    /// Create a new duplicate-registration error.
    pub fn duplicate(name: impl Into<String>) -> Self {
        Self::DuplicateTool(name.into())
    }

    /// True when the error came from the handler rather than the dispatcher.
    pub fn is_handler_error(&self) -> bool {
        matches!(self, Self::Handler(_))
    }
}
