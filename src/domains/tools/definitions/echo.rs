//! Echo tool - returns its arguments unchanged.

use serde_json::{Value, json};

use crate::domains::tools::{Tool, handler_fn};

/// Echo tool implementation.
#[derive(Debug, Clone)]
pub struct EchoTool;

impl EchoTool {
    /// Tool name as registered.
    pub const NAME: &'static str = "echo";

    /// Tool description shown to clients.
    pub const DESCRIPTION: &'static str =
        "Return the supplied arguments unchanged. Useful for connectivity checks.";

    /// Create the tool with its handler.
    pub fn to_tool() -> Tool {
        Tool::new(
            Self::NAME,
            Self::DESCRIPTION,
            handler_fn(|_ctx, arguments| async move { Ok(Value::Object(arguments)) }),
        )
        .with_input_schema(json!({
            "type": "object",
            "additionalProperties": true
        }))
    }
}
