//! Server time tool.

use chrono::{SecondsFormat, Utc};
use serde_json::{Value, json};

use crate::domains::tools::{HandlerError, Tool, handler_fn};

/// Reports the server's current UTC time.
#[derive(Debug, Clone)]
pub struct ServerTimeTool;

impl ServerTimeTool {
    pub const NAME: &'static str = "server_time";

    pub const DESCRIPTION: &'static str =
        "Return the server's current UTC time in RFC 3339 format. Accepts an optional boolean \
         'millis' to include milliseconds.";

    pub fn to_tool() -> Tool {
        Tool::new(
            Self::NAME,
            Self::DESCRIPTION,
            handler_fn(|_ctx, arguments| async move {
                let millis = match arguments.get("millis") {
                    None => false,
                    Some(Value::Bool(b)) => *b,
                    Some(_) => return Err(HandlerError::msg("'millis' must be a boolean")),
                };
                let format = if millis {
                    SecondsFormat::Millis
                } else {
                    SecondsFormat::Secs
                };
                Ok(json!({ "utc": Utc::now().to_rfc3339_opts(format, true) }))
            }),
        )
        .with_input_schema(json!({
            "type": "object",
            "properties": {
                "millis": { "type": "boolean", "description": "Include milliseconds" }
            }
        }))
    }
}
