//! Tool handler capability and the tool model.
//!
//! A tool is a name, a description, an advertised input schema and a handler.
//! Handlers receive the untyped argument map exactly as the caller sent it;
//! shape validation is the handler's own business.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;

use super::error::HandlerError;

/// Untyped argument map passed to every handler.
pub type Arguments = Map<String, Value>;

/// Outcome of a single handler invocation.
pub type HandlerResult = Result<Value, HandlerError>;

/// Capability implemented by every tool.
///
/// The cancellation token is the request-scoped context: it fires when the
/// caller goes away or the server begins shutting down.
#[async_trait::async_trait]
pub trait ToolHandler: Send + Sync {
    /// Execute the tool with the given arguments.
    async fn call(&self, ctx: CancellationToken, arguments: Arguments) -> HandlerResult;
}

/// Adapter turning an async closure into a [`ToolHandler`].
pub struct FnHandler<F>(F);

/// Wrap a closure as a tool handler.
///
/// ```rust
/// use mcp_bridge_server::domains::tools::{handler_fn, Arguments};
/// use serde_json::Value;
///
/// let handler = handler_fn(|_ctx, args: Arguments| async move { Ok(Value::Object(args)) });
/// # let _ = handler;
/// ```
pub fn handler_fn<F, Fut>(f: F) -> Arc<dyn ToolHandler>
where
    F: Fn(CancellationToken, Arguments) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    Arc::new(FnHandler(f))
}

#[async_trait::async_trait]
impl<F, Fut> ToolHandler for FnHandler<F>
where
    F: Fn(CancellationToken, Arguments) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    async fn call(&self, ctx: CancellationToken, arguments: Arguments) -> HandlerResult {
        (self.0)(ctx, arguments).await
    }
}

/// A named, independently invocable operation.
#[derive(Clone)]
pub struct Tool {
    name: String,
    description: String,
    input_schema: Option<Value>,
    handler: Arc<dyn ToolHandler>,
}

impl Tool {
    /// Create a tool without an advertised schema.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        handler: Arc<dyn ToolHandler>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema: None,
            handler,
        }
    }

    /// Attach the schema advertised to clients. It is never enforced here.
    pub fn with_input_schema(mut self, schema: Value) -> Self {
        self.input_schema = Some(schema);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn input_schema(&self) -> Option<&Value> {
        self.input_schema.as_ref()
    }

    pub(crate) fn handler(&self) -> &Arc<dyn ToolHandler> {
        &self.handler
    }

    /// Metadata snapshot for listings.
    pub fn info(&self) -> ToolInfo {
        ToolInfo {
            name: self.name.clone(),
            description: self.description.clone(),
            input_schema: self.input_schema.clone(),
        }
    }
}

impl fmt::Debug for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tool")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("input_schema", &self.input_schema.is_some())
            .finish()
    }
}

/// Listing entry for a registered tool.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema", skip_serializing_if = "Option::is_none")]
    pub input_schema: Option<Value>,
}
