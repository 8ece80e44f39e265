//! Core module containing shared infrastructure components.
//!
//! Configuration, errors, rate gates, metrics, the lifecycle coordinator and
//! the transports live here. The tools themselves live in
//! [`crate::domains::tools`].

pub mod config;
pub mod error;
pub mod lifecycle;
pub mod rate_limit;
pub mod server;
pub mod telemetry;
pub mod transport;

pub use config::Config;
pub use error::{Error, Result};
pub use lifecycle::{Coordinator, LifecycleHandle, LifecycleState};
pub use server::McpServer;
pub use telemetry::{Telemetry, ToolMetrics};
pub use transport::{TransportConfig, TransportService};
