//! Bridge Server Entry Point
//!
//! Initializes logging, loads configuration and runs the configured transport
//! under the lifecycle coordinator until a termination signal arrives.

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::{Level, info};
use tracing_subscriber::{EnvFilter, fmt};

use mcp_bridge_server::core::{Config, Coordinator, McpServer, TransportService};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration from environment
    let config = Config::from_env();

    init_logging(&config.logging.level);

    info!("Starting {} v{}", config.server.name, config.server.version);

    let coordinator = Coordinator::from_config(&config.shutdown);
    let server = McpServer::new(config.clone())?;

    let transport = TransportService::new(config.transport);
    transport
        .run(server, &coordinator, CancellationToken::new())
        .await?;

    info!("Server stopped");

    Ok(())
}

/// Initialize the logging subsystem.
///
/// Logs go to stderr; stdout belongs to the stdio transport.
fn init_logging(level: &str) {
    let level = match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .init();
}
