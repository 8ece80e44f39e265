//! Tool Dispatcher - registration and execution over the registry.
//!
//! The dispatcher owns the [`ToolRegistry`], optionally gates executions with
//! a [`ToolRateGate`] and reports every execution outcome to an injected
//! [`ToolMetrics`] capability.

use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::core::rate_limit::ToolRateGate;
use crate::core::telemetry::ToolMetrics;

use super::error::ToolError;
use super::handlers::{Arguments, Tool, ToolInfo};
use super::registry::ToolRegistry;

/// Entry point for registering and executing tools.
#[derive(Default)]
pub struct Dispatcher {
    registry: ToolRegistry,
    metrics: Option<Arc<dyn ToolMetrics>>,
    rate_gate: Option<Arc<ToolRateGate>>,
}

impl Dispatcher {
    /// Create a dispatcher with an empty registry and no collaborators.
    pub fn new() -> Self {
        Self::default()
    }

    /// Report every execution to `metrics`.
    pub fn with_metrics(mut self, metrics: Arc<dyn ToolMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Gate executions per tool name.
    pub fn with_rate_gate(mut self, gate: Arc<ToolRateGate>) -> Self {
        self.rate_gate = Some(gate);
        self
    }

    /// Register a tool. See [`ToolRegistry::register`].
    pub fn register(&self, tool: Tool) -> Result<(), ToolError> {
        self.registry.register(tool)
    }

    /// Snapshot of all registered tools.
    pub fn list(&self) -> Vec<ToolInfo> {
        self.registry.list()
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Execute the tool `name` with `arguments`.
    ///
    /// The handler runs at most once and its result or error is returned
    /// unchanged. If `ctx` is cancelled first the call ends with
    /// [`ToolError::Cancelled`]. With metrics attached, exactly one outcome is
    /// recorded per call whatever the result.
    pub async fn execute(
        &self,
        name: &str,
        arguments: Arguments,
        ctx: &CancellationToken,
    ) -> Result<Value, ToolError> {
        let Some(metrics) = self.metrics.as_ref() else {
            return self.execute_inner(name, arguments, ctx).await;
        };

        let started = Instant::now();
        let result = self.execute_inner(name, arguments, ctx).await;
        metrics.record_tool_execution(name, result.is_ok(), started.elapsed());
        result
    }

    /// Convert an untyped request payload into an argument map.
    ///
    /// `null` is treated as "no arguments"; any other non-object value is a
    /// validation error.
    pub fn parse_arguments(payload: Value) -> Result<Arguments, ToolError> {
        match payload {
            Value::Object(map) => Ok(map),
            Value::Null => Ok(Arguments::new()),
            other => Err(ToolError::validation(format!(
                "arguments must be a JSON object, got {}",
                json_type(&other)
            ))),
        }
    }

    async fn execute_inner(
        &self,
        name: &str,
        arguments: Arguments,
        ctx: &CancellationToken,
    ) -> Result<Value, ToolError> {
        let tool = self
            .registry
            .get(name)
            .ok_or_else(|| ToolError::not_found(name))?;

        if let Some(gate) = &self.rate_gate {
            gate.wait(name, ctx)
                .await
                .map_err(|source| ToolError::RateLimited {
                    tool: name.to_string(),
                    source,
                })?;
        }

        let handler = tool.handler().clone();
        tokio::select! {
            biased;
            _ = ctx.cancelled() => Err(ToolError::Cancelled(name.to_string())),
            result = handler.call(ctx.clone(), arguments) => result.map_err(ToolError::from),
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("registry", &self.registry)
            .field("metrics", &self.metrics.is_some())
            .field("rate_gate", &self.rate_gate)
            .finish()
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
