//! Transport service - runs the configured transport under the lifecycle
//! coordinator.

use tokio_util::sync::CancellationToken;
use tracing::info;

use super::TransportConfig;
use crate::core::McpServer;
use crate::core::lifecycle::{Coordinator, LifecycleResult};

#[cfg(feature = "stdio")]
use super::stdio::StdioTransport;

#[cfg(feature = "http")]
use super::http::HttpTransport;

/// Transport service - manages the transport layer for the bridge server.
pub struct TransportService {
    config: TransportConfig,
}

impl TransportService {
    /// Create a new transport service with the given configuration.
    pub fn new(config: TransportConfig) -> Self {
        Self { config }
    }

    /// Create a transport service from environment variables.
    pub fn from_env() -> Self {
        Self::new(TransportConfig::from_env())
    }

    /// Get the transport configuration.
    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Log information about the configured transport.
    pub fn log_info(&self) {
        info!("Starting transport: {}", self.config.description());
    }

    /// Serve `server` until `ctx` is cancelled, a termination signal arrives
    /// or the transport stops on its own, then run the shutdown sequence.
    pub async fn run(
        self,
        server: McpServer,
        coordinator: &Coordinator,
        ctx: CancellationToken,
    ) -> LifecycleResult<()> {
        self.log_info();
        server.register_shutdown_hooks(coordinator.hooks());

        match self.config {
            #[cfg(feature = "stdio")]
            TransportConfig::Stdio => {
                coordinator
                    .run(ctx, move |handle| {
                        StdioTransport::run(server.with_lifecycle(handle))
                    })
                    .await
            }
            #[cfg(feature = "http")]
            TransportConfig::Http(cfg) => {
                if let Some(gate) = server.client_gate() {
                    gate.start_sweeper();
                }
                coordinator
                    .run(ctx, move |handle| {
                        HttpTransport::new(cfg).run(server.with_lifecycle(handle))
                    })
                    .await
            }
        }
    }
}
