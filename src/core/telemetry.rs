//! Metrics capability and its Prometheus-backed implementation.
//!
//! The dispatcher only sees the single-method [`ToolMetrics`] capability.
//! [`Telemetry`] implements it, additionally records HTTP request metrics and
//! renders the text exposition served at `GET /metrics`.

use std::time::Duration;

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};

/// Records the outcome of every tool execution.
pub trait ToolMetrics: Send + Sync {
    fn record_tool_execution(&self, name: &str, success: bool, duration: Duration);
}

/// Prometheus registry holding all bridge metrics.
#[derive(Clone)]
pub struct Telemetry {
    registry: Registry,
    tool_executions: IntCounterVec,
    tool_duration: HistogramVec,
    http_requests: IntCounterVec,
    http_duration: HistogramVec,
}

impl Telemetry {
    /// Create and register all collectors on a fresh registry.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let tool_executions = IntCounterVec::new(
            Opts::new("tool_executions_total", "Tool executions by outcome"),
            &["tool", "outcome"],
        )?;
        let tool_duration = HistogramVec::new(
            HistogramOpts::new("tool_execution_duration_seconds", "Tool execution latency"),
            &["tool"],
        )?;
        let http_requests = IntCounterVec::new(
            Opts::new("http_requests_total", "HTTP requests by method, route and status"),
            &["method", "route", "status"],
        )?;
        let http_duration = HistogramVec::new(
            HistogramOpts::new("http_request_duration_seconds", "HTTP request latency"),
            &["method", "route"],
        )?;

        registry.register(Box::new(tool_executions.clone()))?;
        registry.register(Box::new(tool_duration.clone()))?;
        registry.register(Box::new(http_requests.clone()))?;
        registry.register(Box::new(http_duration.clone()))?;

        Ok(Self {
            registry,
            tool_executions,
            tool_duration,
            http_requests,
            http_duration,
        })
    }

    /// Record one completed HTTP request.
    pub fn record_http_request(&self, method: &str, route: &str, status: u16, duration: Duration) {
        self.http_requests
            .with_label_values(&[method, route, &status.to_string()])
            .inc();
        self.http_duration
            .with_label_values(&[method, route])
            .observe(duration.as_secs_f64());
    }

    /// Render all metrics in the Prometheus text format.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let mut buf = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buf)?;
        String::from_utf8(buf).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }

    pub fn content_type(&self) -> &'static str {
        prometheus::TEXT_FORMAT
    }
}

impl ToolMetrics for Telemetry {
    fn record_tool_execution(&self, name: &str, success: bool, duration: Duration) {
        let outcome = if success { "success" } else { "error" };
        self.tool_executions
            .with_label_values(&[name, outcome])
            .inc();
        self.tool_duration
            .with_label_values(&[name])
            .observe(duration.as_secs_f64());
    }
}

impl std::fmt::Debug for Telemetry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Telemetry").finish_non_exhaustive()
    }
}
