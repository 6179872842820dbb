//! FileMaker MCP Server - Main entry point.

use filemaker_mcp_server::config::{Config, TransportMode};
use filemaker_mcp_server::db::{ConnectionRegistry, SchemaInspector, driver_for};
use filemaker_mcp_server::mcp::GatewayService;
use filemaker_mcp_server::tools::ToolContext;
use filemaker_mcp_server::transport::{HttpTransport, StdioTransport, Transport};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Tables printed by `--check` before the total.
const CHECK_PREVIEW_TABLES: usize = 20;

/// Initialize the tracing subscriber. Logs go to stderr; stdout carries the
/// stdio transport.
fn init_tracing(config: &Config) {
    if !config.enable_logs {
        return;
    }

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        subscriber
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

/// Open one database, print its tables and close again.
async fn run_check(config: &Config, registry: &ConnectionRegistry) -> ExitCode {
    let database = config.check_database();
    println!(
        "Checking {} data source '{}' (database: {})",
        config.driver, config.dsn, database
    );

    match SchemaInspector::check_database(registry, &config.executor(), &database).await {
        Ok(tables) => {
            println!("Connected. Tables:");
            for table in tables.iter().take(CHECK_PREVIEW_TABLES) {
                println!("  {}", table);
            }
            println!("Total tables: {}", tables.len());
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Connection check failed: {}", e);
            if let Some(suggestion) = e.suggestion() {
                eprintln!("Suggestion: {}", suggestion);
            }
            ExitCode::FAILURE
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let config = Config::parse_args();

    init_tracing(&config);

    if let Err(message) = config.validate() {
        eprintln!("Error: {}", message);
        return ExitCode::FAILURE;
    }

    let driver = match driver_for(config.driver) {
        Ok(driver) => driver,
        Err(e) => {
            eprintln!("Error: {}", e);
            if let Some(suggestion) = e.suggestion() {
                eprintln!("Suggestion: {}", suggestion);
            }
            return ExitCode::FAILURE;
        }
    };

    let registry = Arc::new(
        ConnectionRegistry::new(driver, config.connection_config())
            .with_connect_timeout(config.connect_timeout_duration()),
    );

    if config.check {
        return run_check(&config, &registry).await;
    }

    let databases = config.database_catalog();
    info!(
        transport = %config.transport,
        driver = %config.driver,
        databases = databases.len(),
        "Starting FileMaker MCP Server v{}",
        env!("CARGO_PKG_VERSION")
    );

    let service = GatewayService::new(ToolContext::new(registry, config.executor(), databases));

    let result = match config.transport {
        TransportMode::Stdio => StdioTransport::new(service).run().await,
        TransportMode::Http => {
            info!(
                host = %config.http_host,
                port = config.http_port,
                endpoint = %config.mcp_endpoint,
                "Using HTTP transport"
            );
            HttpTransport::new(
                service,
                &config.http_host,
                config.http_port,
                &config.mcp_endpoint,
            )
            .run()
            .await
        }
    };

    if let Err(e) = result {
        error!(error = %e, "Server error");
        eprintln!("Error: {}", e);
        return ExitCode::FAILURE;
    }

    info!("Server shutdown complete");
    ExitCode::SUCCESS
}
