//! MCP Bridge Server Library
//!
//! A request-serving core that exposes named tools to remote callers over
//! stdio (MCP) and HTTP, with per-client and per-tool rate gates, metrics and
//! a coordinated graceful shutdown.
//!
//! # Architecture
//!
//! - **core**: configuration, errors, rate gates, telemetry, the lifecycle
//!   coordinator, transports and the [`McpServer`] root
//! - **domains**: business logic organized by bounded contexts
//!   - **tools**: tool model, registry, dispatcher and built-in tools
//!
//! # Example
//!
//! ```rust,no_run
//! use mcp_bridge_server::core::{Config, Coordinator, McpServer, TransportService};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env();
//!     let coordinator = Coordinator::from_config(&config.shutdown);
//!     let server = McpServer::new(config.clone())?;
//!     TransportService::new(config.transport)
//!         .run(server, &coordinator, CancellationToken::new())
//!         .await?;
//!     Ok(())
//! }
//! ```

pub mod core;
pub mod domains;

// Re-export commonly used types for convenience
pub use core::{Config, Error, McpServer, Result};
