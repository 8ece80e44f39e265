//! Request middleware, listed outermost first.
//!
//! Each layer either short-circuits with a terminal response or passes the
//! request on; none of them panics on malformed input.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, HeaderValue, Method, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tower_http::cors::{Any, CorsLayer};
use tracing::{Span, error, field, info, info_span, warn};

use super::AppState;
use super::handlers::ApiError;
use crate::core::rate_limit::{RateLimitError, resolve_client_key};

/// Paths reachable without a bearer token.
const PUBLIC_PATHS: [&str; 2] = ["/health", "/metrics"];

/// Reject new work once shutdown has begun; count everything else as in
/// flight until its response is produced.
pub async fn shutdown_gate(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if state.lifecycle.is_shutting_down() {
        return ApiError::new(StatusCode::SERVICE_UNAVAILABLE, "server is shutting down")
            .into_response();
    }
    let _guard = state.lifecycle.enter();
    next.run(request).await
}

/// Answer every `OPTIONS` as a preflight and tag all other responses with
/// `Access-Control-Allow-Origin: *`. Sits outside auth, so preflights never
/// need a token.
pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

/// Require `Authorization: Bearer <token>` when a token is configured.
pub async fn auth(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let Some(expected) = state.auth_token.as_deref() else {
        return next.run(request).await;
    };
    if PUBLIC_PATHS.contains(&request.uri().path()) {
        return next.run(request).await;
    }

    match check_bearer(request.headers(), expected) {
        Ok(()) => next.run(request).await,
        Err(err) => {
            warn!(path = %request.uri().path(), reason = %err.message(), "Rejected unauthenticated request");
            err.into_response()
        }
    }
}

fn check_bearer(headers: &HeaderMap, expected: &str) -> Result<(), ApiError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or_else(|| ApiError::unauthorized("Authorization header required"))?;
    let token = value
        .to_str()
        .ok()
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| ApiError::unauthorized("Invalid authorization header format"))?;
    if token != expected {
        return Err(ApiError::unauthorized("Invalid token"));
    }
    Ok(())
}

/// Per-client token bucket, keyed by forwarded address or peer address.
pub async fn client_rate_limit(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let Some(gate) = state.server.client_gate() else {
        return next.run(request).await;
    };
    if gate.is_bypassed(request.uri().path()) {
        return next.run(request).await;
    }

    let headers = request.headers();
    let remote = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let client = resolve_client_key(
        header_str(headers, "x-forwarded-for"),
        header_str(headers, "x-real-ip"),
        remote,
    );

    match gate.check(&client) {
        Ok(()) => next.run(request).await,
        Err(RateLimitError::Exhausted { retry_after }) => {
            warn!(client = %client, "Client rate limit exceeded");
            let secs = retry_after.as_secs_f64().ceil().max(1.0) as u64;
            let mut response =
                ApiError::new(StatusCode::TOO_MANY_REQUESTS, "rate limit exceeded").into_response();
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
            response
        }
        Err(err) => {
            error!(error = %err, "Client rate gate failed");
            ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response()
        }
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Record request count and latency under a bounded route label.
pub async fn metrics(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let route = route_label(request.uri().path());
    let started = Instant::now();

    let response = next.run(request).await;
    state.server.telemetry().record_http_request(
        method.as_str(),
        route,
        response.status().as_u16(),
        started.elapsed(),
    );
    response
}

/// Collapse paths onto the fixed set of route labels.
pub fn route_label(path: &str) -> &'static str {
    match path {
        "/health" => "/health",
        "/info" => "/info",
        "/tools" => "/tools",
        "/metrics" => "/metrics",
        p if p.starts_with("/tools/") => "/tools/{name}",
        _ => "other",
    }
}

/// Span for [`TraceLayer`]; `status` stays empty until [`record_status`].
///
/// [`TraceLayer`]: tower_http::trace::TraceLayer
pub fn request_span(request: &Request) -> Span {
    info_span!(
        "http_request",
        method = %request.method(),
        path = %request.uri().path(),
        status = field::Empty,
    )
}

pub fn record_status(response: &Response, _latency: Duration, span: &Span) {
    span.record("status", response.status().as_u16());
}

/// One log event per request, levelled by status class.
pub async fn log_request(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let started = Instant::now();

    let response = next.run(request).await;
    let status = response.status().as_u16();
    let duration_ms = started.elapsed().as_millis() as u64;

    if response.status().is_server_error() {
        error!(%method, %path, status, duration_ms, "Request failed");
    } else if response.status().is_client_error() {
        warn!(%method, %path, status, duration_ms, "Request rejected");
    } else {
        info!(%method, %path, status, duration_ms, "Request completed");
    }
    response
}
