//! Stdio transport for the MCP server.
//!
//! This transport uses standard input/output for communication,
//! which is the standard mode for CLI-based MCP integrations.

use crate::error::{DbError, DbResult};
use crate::mcp::GatewayService;
use crate::transport::{Transport, wait_for_signal};
use rmcp::{ServiceExt, transport::stdio};
use tracing::{info, warn};

/// Reads JSON-RPC messages from stdin and writes responses to stdout.
pub struct StdioTransport {
    service: GatewayService,
}

impl StdioTransport {
    pub fn new(service: GatewayService) -> Self {
        Self { service }
    }
}

impl Transport for StdioTransport {
    async fn run(&self) -> DbResult<()> {
        info!("Starting MCP server with stdio transport");

        let running_service = self
            .service
            .clone()
            .serve(stdio())
            .await
            .map_err(|e| DbError::internal(format!("Failed to start stdio transport: {}", e)))?;

        let shutdown_requested = tokio::select! {
            result = running_service.waiting() => {
                if let Err(e) = result {
                    warn!(error = %e, "Stdio transport error");
                    self.service.registry().close_all().await;
                    return Err(DbError::internal(format!("Stdio transport error: {}", e)));
                }
                info!("Stdio transport completed normally");
                false
            }
            _ = wait_for_signal() => {
                info!("Shutdown signal received (send again to force exit)");
                true
            }
        };

        if shutdown_requested {
            tokio::spawn(async {
                wait_for_signal().await;
                warn!("Received second signal, forcing immediate exit");
                std::process::exit(1);
            });
        }

        info!("Closing all database connections");
        self.service.registry().close_all().await;

        if shutdown_requested {
            // A pending stdin read cannot be interrupted from here
            info!("Exiting process");
            std::process::exit(0);
        }

        Ok(())
    }

    fn name(&self) -> &'static str {
        "stdio"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{ConnectionRegistry, QueryExecutor, SqliteDriver};
    use crate::models::ConnectionConfig;
    use crate::tools::ToolContext;
    use std::sync::Arc;

    #[test]
    fn test_stdio_transport_creation() {
        let registry = Arc::new(ConnectionRegistry::new(
            Arc::new(SqliteDriver),
            ConnectionConfig::default(),
        ));
        let ctx = ToolContext::new(registry, QueryExecutor::new(), vec!["Patients".into()]);
        let transport = StdioTransport::new(GatewayService::new(ctx));
        assert_eq!(transport.name(), "stdio");
    }
}
