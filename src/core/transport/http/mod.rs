//! HTTP transport implementation.
//!
//! Plain JSON endpoints over the tool dispatcher:
//!
//! | Route                | Purpose                               |
//! |----------------------|---------------------------------------|
//! | `GET /health`        | Liveness, bypasses auth and the gate  |
//! | `GET /info`          | Server name, version and capabilities |
//! | `GET /tools`         | Registered tools, sorted by name      |
//! | `POST /tools/{name}` | Execute a tool with a JSON object     |
//! | `GET /metrics`       | Prometheus text exposition            |
//!
//! Every request passes through the middleware in [`middleware`], outermost
//! first: shutdown gate, CORS, auth, client rate limit, metrics, trace span,
//! request log.

pub mod handlers;
pub mod middleware;

use std::any::Any;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::StatusCode,
    middleware::{from_fn, from_fn_with_state},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use tower::ServiceBuilder;
use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};
use tracing::{error, info};

use self::handlers::ApiError;
use super::{HttpConfig, TransportError, TransportResult};
use crate::core::McpServer;
use crate::core::lifecycle::LifecycleHandle;

/// HTTP transport handler.
pub struct HttpTransport {
    config: HttpConfig,
}

/// State shared by handlers and middleware.
#[derive(Clone)]
pub struct AppState {
    server: McpServer,
    lifecycle: LifecycleHandle,
    auth_token: Option<Arc<str>>,
}

impl HttpTransport {
    /// Create a new HTTP transport with the given config.
    pub fn new(config: HttpConfig) -> Self {
        Self { config }
    }

    /// Get the bind address.
    pub fn address(&self) -> String {
        format!("{}:{}", self.config.host, self.config.port)
    }

    /// Serve until the server's lifecycle begins shutting down, then stop
    /// accepting connections and wait for open ones to finish.
    pub async fn run(self, server: McpServer) -> TransportResult<()> {
        let addr = self.address();
        let shutdown = server.lifecycle().shutdown_token().clone();
        let app = router(server, &self.config);

        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| TransportError::bind(&addr, e))?;

        info!(
            "Ready - listening on {} (auth {})",
            addr,
            if self.config.auth_token.is_some() { "enabled" } else { "disabled" },
        );
        info!("  → Tools:   GET /tools, POST /tools/{{name}}");
        info!("  → Health:  GET /health");
        info!("  → Metrics: GET /metrics");

        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| TransportError::http(e.to_string()))?;

        info!("HTTP transport stopped");
        Ok(())
    }
}

/// Build the router with every route and middleware layer.
pub fn router(server: McpServer, config: &HttpConfig) -> Router {
    let state = AppState {
        lifecycle: server.lifecycle().clone(),
        auth_token: config.auth_token.as_deref().map(Arc::from),
        server,
    };

    Router::new()
        .route(
            "/health",
            get(handlers::health).fallback(handlers::method_not_allowed),
        )
        .route(
            "/info",
            get(handlers::info).fallback(handlers::method_not_allowed),
        )
        .route(
            "/tools",
            get(handlers::list_tools).fallback(handlers::method_not_allowed),
        )
        .route(
            "/tools/{name}",
            post(handlers::call_tool).fallback(handlers::method_not_allowed),
        )
        .route(
            "/metrics",
            get(handlers::metrics).fallback(handlers::method_not_allowed),
        )
        .fallback(handlers::not_found)
        .layer(
            ServiceBuilder::new()
                .layer(from_fn_with_state(state.clone(), middleware::shutdown_gate))
                .layer(middleware::cors_layer())
                .layer(from_fn_with_state(state.clone(), middleware::auth))
                .layer(from_fn_with_state(
                    state.clone(),
                    middleware::client_rate_limit,
                ))
                .layer(from_fn_with_state(state.clone(), middleware::metrics))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(middleware::request_span)
                        .on_response(middleware::record_status)
                        .on_failure(()),
                )
                .layer(from_fn(middleware::log_request))
                .layer(CatchPanicLayer::custom(panic_response))
                .layer(DefaultBodyLimit::max(config.max_body_bytes)),
        )
        .with_state(state)
}

fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    error!(panic = %detail, "Handler panicked");
    ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "internal server error").into_response()
}
