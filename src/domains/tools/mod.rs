//! Tools domain module.
//!
//! Tools are named operations that remote callers invoke through one of the
//! transports. Every transport reaches them through the same [`Dispatcher`].
//!
//! ## Architecture
//!
//! - `handlers.rs` - The [`ToolHandler`] capability and the [`Tool`] model
//! - `registry.rs` - Name-keyed, append-only [`ToolRegistry`]
//! - `dispatcher.rs` - Registration, execution, rate gating and metrics
//! - `definitions/` - Built-in tools (one file per tool)
//! - `error.rs` - Tool-specific error types
//!
//! ## Adding a New Tool
//!
//! 1. Create a new file in `definitions/` exposing `NAME`, `DESCRIPTION`
//!    and `to_tool()`
//! 2. Export it in `definitions/mod.rs` and add it to `builtin_tools()`
//!
//! Tools supplied by other crates can be registered directly with
//! [`Dispatcher::register`] using [`handler_fn`] or a [`ToolHandler`] impl.

pub mod definitions;
mod dispatcher;
mod error;
mod handlers;
mod registry;

pub use definitions::builtin_tools;
pub use dispatcher::Dispatcher;
pub use error::{HandlerError, ToolError};
pub use handlers::{Arguments, FnHandler, HandlerResult, Tool, ToolHandler, ToolInfo, handler_fn};
pub use registry::{ToolRegistry, validate_name};
