//! Transport layer for the bridge server.
//!
//! This module provides two transport implementations:
//! - **STDIO**: MCP over standard input/output - feature: `stdio`
//! - **HTTP**: JSON endpoints for listing and calling tools - feature: `http`
//!
//! Both delegate to the same tool dispatcher and run under the lifecycle
//! coordinator, so they share drain and shutdown behaviour.
//!
//! # Feature Flags
//!
//! Transport implementations are conditionally compiled based on features:
//! - `stdio` (default): STDIO transport - minimal dependencies
//! - `http` (default): HTTP transport - adds axum, tower, tower-http

mod config;
mod error;
mod service;

#[cfg(feature = "http")]
pub mod http;

#[cfg(feature = "stdio")]
pub mod stdio;

pub use config::TransportConfig;
pub use error::{TransportError, TransportResult};
pub use service::TransportService;

#[cfg(feature = "http")]
pub use config::HttpConfig;
