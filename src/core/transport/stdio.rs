//! STDIO transport implementation.
//!
//! Standard input/output transport for MCP. The rmcp service is cancelled
//! once the shutdown broadcast fires.

use rmcp::ServiceExt;
use tracing::info;

use super::{TransportError, TransportResult};
use crate::core::McpServer;

/// STDIO transport handler.
pub struct StdioTransport;

impl StdioTransport {
    /// Run the STDIO transport until the peer disconnects or shutdown begins.
    pub async fn run(server: McpServer) -> TransportResult<()> {
        let lifecycle = server.lifecycle().clone();
        info!("Ready - communicating via stdin/stdout");

        let service = server
            .serve(rmcp::transport::stdio())
            .await
            .map_err(|e| TransportError::init(e.to_string()))?;

        let cancel = service.cancellation_token();
        let watcher = tokio::spawn(async move {
            lifecycle.shutting_down().await;
            info!("Shutdown requested, closing STDIO service");
            cancel.cancel();
        });

        let result = service.waiting().await;
        watcher.abort();
        result.map_err(|e| TransportError::service(e.to_string()))?;

        info!("STDIO transport finished");
        Ok(())
    }
}
