//! Route handlers and the JSON error envelope.

use axum::{
    Json,
    body::Bytes,
    extract::{Path, State, rejection::BytesRejection},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::{Value, json};
use tracing::{debug, warn};

use super::AppState;
use crate::core::rate_limit::RateLimitError;
use crate::domains::tools::{Dispatcher, ToolError};

/// An error response: `{"error": "<message>"}` with a status code.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

impl From<ToolError> for ApiError {
    fn from(err: ToolError) -> Self {
        let status = match &err {
            ToolError::Validation(_) => StatusCode::BAD_REQUEST,
            ToolError::NotFound(_) => StatusCode::NOT_FOUND,
            ToolError::DuplicateTool(_) => StatusCode::CONFLICT,
            ToolError::RateLimited {
                source: RateLimitError::Cancelled,
                ..
            }
            | ToolError::Cancelled(_) => StatusCode::SERVICE_UNAVAILABLE,
            ToolError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            ToolError::Handler(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, err.to_string())
    }
}

/// `GET /health`
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": state.server.version(),
    }))
}

/// `GET /info`
pub async fn info(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "name": state.server.name(),
        "version": state.server.version(),
        "capabilities": {
            "tools": true,
            "resources": false,
            "prompts": false,
        },
    }))
}

/// `GET /tools`
pub async fn list_tools(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "tools": state.server.dispatcher().list() }))
}

/// `POST /tools/{name}`
pub async fn call_tool(
    State(state): State<AppState>,
    Path(name): Path<String>,
    body: Result<Bytes, BytesRejection>,
) -> Result<Json<Value>, ApiError> {
    let body = body.map_err(|rejection| ApiError::new(rejection.status(), rejection.body_text()))?;
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(ApiError::bad_request("request body must be a JSON object"));
    }
    let payload: Value = serde_json::from_slice(&body)
        .map_err(|e| ApiError::bad_request(format!("invalid JSON body: {e}")))?;
    let arguments = Dispatcher::parse_arguments(payload)?;

    let ctx = state.lifecycle.request_context();
    match state.server.dispatcher().execute(&name, arguments, &ctx).await {
        Ok(result) => {
            debug!(tool = %name, "Tool call succeeded");
            Ok(Json(json!({ "result": result })))
        }
        Err(err) => {
            if err.is_handler_error() {
                warn!(tool = %name, error = %err, "Tool call failed");
            }
            Err(err.into())
        }
    }
}

/// `GET /metrics`
pub async fn metrics(State(state): State<AppState>) -> Result<Response, ApiError> {
    let telemetry = state.server.telemetry();
    let text = telemetry.render().map_err(|e| {
        ApiError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("failed to render metrics: {e}"),
        )
    })?;
    Ok(([(header::CONTENT_TYPE, telemetry.content_type())], text).into_response())
}

/// Known path, unsupported method.
pub async fn method_not_allowed() -> ApiError {
    ApiError::new(StatusCode::METHOD_NOT_ALLOWED, "method not allowed")
}

/// Unknown path.
pub async fn not_found() -> ApiError {
    ApiError::new(StatusCode::NOT_FOUND, "not found")
}
