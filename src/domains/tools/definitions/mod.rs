//! Built-in tool definitions.
//!
//! Each tool is defined in its own file and exposes `NAME`, `DESCRIPTION`
//! and `to_tool()`. [`builtin_tools`] lists everything registered at startup.

pub mod echo;
pub mod server_time;

pub use echo::EchoTool;
pub use server_time::ServerTimeTool;

use super::Tool;

/// All built-in tools, ready for registration.
pub fn builtin_tools() -> Vec<Tool> {
    vec![EchoTool::to_tool(), ServerTimeTool::to_tool()]
}
