//! Bridge server root and its MCP protocol handler.
//!
//! [`McpServer`] wires the configured collaborators together: the tool
//! [`Dispatcher`] with its metrics and optional tool gate, the per-client
//! HTTP gate and the lifecycle handle transports use to observe shutdown.
//! It also implements rmcp's `ServerHandler`, so the stdio transport serves
//! `tools/list` and `tools/call` straight from the dispatcher.

use std::sync::Arc;

use rmcp::{
    ErrorData as McpError, RoleServer, ServerHandler, model::*, service::RequestContext,
};
use serde_json::Value;
use tracing::{info, instrument, warn};

use super::config::Config;
use super::error::Result;
use super::lifecycle::{LifecycleHandle, ShutdownManager};
use super::rate_limit::{ClientRateGate, ToolRateGate};
use super::telemetry::Telemetry;
use crate::domains::tools::{Dispatcher, Tool, ToolError, ToolInfo, builtin_tools};

/// The bridge server.
///
/// Cloning is cheap; all clones share the same dispatcher and gates.
#[derive(Clone)]
pub struct McpServer {
    /// Server configuration.
    config: Arc<Config>,

    dispatcher: Arc<Dispatcher>,

    telemetry: Arc<Telemetry>,

    /// Per-client HTTP gate, absent when disabled.
    client_gate: Option<Arc<ClientRateGate>>,

    lifecycle: LifecycleHandle,
}

impl McpServer {
    /// Create a server with the built-in tools registered.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let config = Arc::new(config);
        let telemetry = Arc::new(Telemetry::new()?);

        let mut dispatcher = Dispatcher::new().with_metrics(telemetry.clone());
        let rl = &config.rate_limit;
        if let Some(per_minute) = rl.tool_per_minute {
            dispatcher = dispatcher.with_rate_gate(Arc::new(ToolRateGate::new(
                per_minute,
                rl.tool_burst,
            )?));
        }
        for tool in builtin_tools() {
            dispatcher.register(tool)?;
        }

        let client_gate = if rl.enabled {
            Some(Arc::new(ClientRateGate::new(
                rl.client_rate,
                rl.client_burst,
                rl.client_ttl(),
                rl.sweep_interval(),
            )?))
        } else {
            None
        };

        info!(
            tools = dispatcher.registry().len(),
            client_gate = client_gate.is_some(),
            "Server initialized"
        );

        Ok(Self {
            config,
            dispatcher: Arc::new(dispatcher),
            telemetry,
            client_gate,
            lifecycle: LifecycleHandle::new(),
        })
    }

    /// Bind this server to a lifecycle handle.
    pub fn with_lifecycle(mut self, lifecycle: LifecycleHandle) -> Self {
        self.lifecycle = lifecycle;
        self
    }

    /// Register stop hooks for the background work this server owns.
    pub fn register_shutdown_hooks(&self, hooks: &ShutdownManager) {
        if let Some(gate) = &self.client_gate {
            let gate = gate.clone();
            hooks.register("client-rate-sweeper", move |_ctx| async move {
                gate.stop_sweeper();
                Ok(())
            });
        }
    }

    /// Register an additional tool.
    pub fn register_tool(&self, tool: Tool) -> std::result::Result<(), ToolError> {
        self.dispatcher.register(tool)
    }

    /// Get the server name.
    pub fn name(&self) -> &str {
        &self.config.server.name
    }

    /// Get the server version.
    pub fn version(&self) -> &str {
        &self.config.server.version
    }

    pub fn config(&self) -> &Arc<Config> {
        &self.config
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    pub fn telemetry(&self) -> &Arc<Telemetry> {
        &self.telemetry
    }

    pub fn client_gate(&self) -> Option<&Arc<ClientRateGate>> {
        self.client_gate.as_ref()
    }

    pub fn lifecycle(&self) -> &LifecycleHandle {
        &self.lifecycle
    }

    /// Run a tool on behalf of an MCP peer.
    ///
    /// Refused once shutdown has begun; otherwise counted as in flight and
    /// cancelled with the shutdown broadcast. Handler failures come back as
    /// error results rather than protocol errors.
    #[instrument(skip(self, arguments))]
    pub async fn invoke_tool(
        &self,
        name: &str,
        arguments: Option<JsonObject>,
    ) -> std::result::Result<CallToolResult, McpError> {
        if self.lifecycle.is_shutting_down() {
            return Err(McpError::internal_error("server is shutting down", None));
        }
        let _guard = self.lifecycle.enter();
        let ctx = self.lifecycle.request_context();

        match self
            .dispatcher
            .execute(name, arguments.unwrap_or_default(), &ctx)
            .await
        {
            Ok(output) => Ok(CallToolResult::success(vec![Content::text(
                output.to_string(),
            )])),
            Err(err) if err.is_handler_error() => {
                warn!(error = %err, "Tool failed");
                Ok(CallToolResult::error(vec![Content::text(err.to_string())]))
            }
            Err(err) => Err(to_mcp_error(err)),
        }
    }
}

fn to_mcp_tool(info: ToolInfo) -> rmcp::model::Tool {
    let input_schema = match info.input_schema {
        Some(Value::Object(map)) => map,
        _ => {
            let mut map = JsonObject::new();
            map.insert("type".to_string(), Value::String("object".to_string()));
            map
        }
    };
    rmcp::model::Tool {
        name: info.name.into(),
        description: Some(info.description.into()),
        input_schema: Arc::new(input_schema),
        annotations: None,
        output_schema: None,
        icons: None,
        meta: None,
        title: None,
    }
}

fn to_mcp_error(err: ToolError) -> McpError {
    match err {
        ToolError::NotFound(_) | ToolError::Validation(_) | ToolError::DuplicateTool(_) => {
            McpError::invalid_params(err.to_string(), None)
        }
        _ => McpError::internal_error(err.to_string(), None),
    }
}

impl ServerHandler for McpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(format!(
                "{} exposes {} tools. Use tools/list to discover them.",
                self.name(),
                self.dispatcher.registry().len()
            )),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> std::result::Result<ListToolsResult, McpError> {
        Ok(ListToolsResult {
            tools: self.dispatcher.list().into_iter().map(to_mcp_tool).collect(),
            next_cursor: None,
            meta: None,
        })
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> std::result::Result<CallToolResult, McpError> {
        self.invoke_tool(&request.name, request.arguments).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::tools::{HandlerError, handler_fn};
    use serde_json::json;

    #[test]
    fn test_new_registers_builtin_tools() {
        let server = McpServer::new(Config::default()).unwrap();
        let names = server.dispatcher().registry().tool_names();
        assert_eq!(names, vec!["echo".to_string(), "server_time".to_string()]);
        assert!(server.client_gate().is_some());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = Config::default();
        config.rate_limit.client_burst = 0;
        assert!(McpServer::new(config).is_err());
    }

    #[test]
    fn test_disabled_client_gate() {
        let mut config = Config::default();
        config.rate_limit.enabled = false;
        let server = McpServer::new(config).unwrap();
        assert!(server.client_gate().is_none());
    }

    #[tokio::test]
    async fn test_shutdown_hook_stops_sweeper() {
        let server = McpServer::new(Config::default()).unwrap();
        let hooks = ShutdownManager::new();
        server.register_shutdown_hooks(&hooks);

        let gate = server.client_gate().unwrap().clone();
        gate.start_sweeper();
        assert!(gate.is_sweeping());

        hooks
            .shutdown(&tokio_util::sync::CancellationToken::new())
            .await
            .unwrap();
        assert!(!gate.is_sweeping());
    }

    #[test]
    fn test_mcp_tool_conversion() {
        let info = ToolInfo {
            name: "echo".to_string(),
            description: "Echo".to_string(),
            input_schema: Some(json!({ "type": "object", "properties": {} })),
        };
        let tool = to_mcp_tool(info);
        assert_eq!(tool.name, "echo");
        assert!(tool.input_schema.contains_key("properties"));

        let bare = to_mcp_tool(ToolInfo {
            name: "bare".to_string(),
            description: String::new(),
            input_schema: None,
        });
        assert_eq!(bare.input_schema.get("type"), Some(&json!("object")));
    }

    fn slow_tool() -> Tool {
        Tool::new(
            "slow",
            "",
            handler_fn(|_, _| async {
                tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
                Ok(Value::Null)
            }),
        )
    }

    #[tokio::test]
    async fn test_invoke_tool_success() {
        let server = McpServer::new(Config::default()).unwrap();
        let mut args = JsonObject::new();
        args.insert("x".to_string(), json!(1));

        let result = server.invoke_tool("echo", Some(args)).await.unwrap();
        assert_eq!(result.is_error, Some(false));
        let text = result.content[0].as_text().unwrap().text.clone();
        assert_eq!(serde_json::from_str::<Value>(&text).unwrap(), json!({ "x": 1 }));

        let result = server.invoke_tool("echo", None).await.unwrap();
        assert_eq!(result.content[0].as_text().unwrap().text, "{}");
    }

    #[tokio::test]
    async fn test_invoke_tool_handler_failure_is_error_result() {
        let server = McpServer::new(Config::default()).unwrap();
        server
            .register_tool(Tool::new(
                "flaky",
                "",
                handler_fn(|_, _| async { Err(HandlerError::msg("upstream timed out")) }),
            ))
            .unwrap();

        let result = server.invoke_tool("flaky", None).await.unwrap();
        assert_eq!(result.is_error, Some(true));
        assert_eq!(result.content[0].as_text().unwrap().text, "upstream timed out");

        let err = server.invoke_tool("missing", None).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::INVALID_PARAMS);
    }

    #[tokio::test]
    async fn test_invoke_tool_refused_after_shutdown() {
        let lifecycle = LifecycleHandle::new();
        let server = McpServer::new(Config::default())
            .unwrap()
            .with_lifecycle(lifecycle.clone());

        lifecycle.trigger_shutdown();
        let err = server.invoke_tool("echo", None).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::INTERNAL_ERROR);
        assert_eq!(err.message, "server is shutting down");
        assert_eq!(lifecycle.in_flight().count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invoke_tool_tracked_in_flight_and_cancelled() {
        let lifecycle = LifecycleHandle::new();
        let server = McpServer::new(Config::default())
            .unwrap()
            .with_lifecycle(lifecycle.clone());
        server.register_tool(slow_tool()).unwrap();

        let call = {
            let server = server.clone();
            tokio::spawn(async move { server.invoke_tool("slow", None).await })
        };
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert_eq!(lifecycle.in_flight().count(), 1);

        lifecycle.trigger_shutdown();
        let err = call.await.unwrap().unwrap_err();
        assert_eq!(err.code, ErrorCode::INTERNAL_ERROR);
        assert_eq!(err.message, "tool execution cancelled: slow");
        assert_eq!(lifecycle.in_flight().count(), 0);
    }

    #[test]
    fn test_error_mapping() {
        let err = to_mcp_error(ToolError::not_found("missing"));
        assert_eq!(err.code, ErrorCode::INVALID_PARAMS);
        let err = to_mcp_error(ToolError::Cancelled("slow".to_string()));
        assert_eq!(err.code, ErrorCode::INTERNAL_ERROR);
    }
}
