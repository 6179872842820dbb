//! Configuration handling for the FileMaker MCP server.
//!
//! This module provides configuration management via CLI arguments and
//! environment variables.

use crate::db::DriverKind;
use crate::db::executor::{DEFAULT_MAX_CONCURRENT_QUERIES, QueryExecutor};
use crate::db::registry::DEFAULT_CONNECT_TIMEOUT_SECS;
use crate::models::{
    ConnectionConfig, DEFAULT_DATABASES, DEFAULT_DSN, DEFAULT_QUERY_TIMEOUT_SECS, MAX_ROW_LIMIT,
};
use clap::{Parser, ValueEnum};
use std::time::Duration;

pub const DEFAULT_HTTP_HOST: &str = "127.0.0.1";
pub const DEFAULT_HTTP_PORT: u16 = 8080;
pub const DEFAULT_MCP_ENDPOINT: &str = "/";

/// Transport mode for the MCP server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum TransportMode {
    /// Standard input/output (for CLI integration)
    #[default]
    Stdio,
    /// Streamable HTTP (for web clients)
    Http,
}

impl std::fmt::Display for TransportMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stdio => write!(f, "stdio"),
            Self::Http => write!(f, "http"),
        }
    }
}

#[derive(Parser, Clone)]
#[command(name = "filemaker-mcp-server")]
#[command(about = "MCP server exposing FileMaker databases over ODBC")]
#[command(version)]
pub struct Config {
    /// ODBC data source name. With --driver sqlite, a directory of <name>.db files.
    #[arg(long, default_value = DEFAULT_DSN, env = "FILEMAKER_DSN")]
    pub dsn: String,

    /// Database user
    #[arg(long, env = "FILEMAKER_USER")]
    pub user: Option<String>,

    /// Database password
    #[arg(long, env = "FILEMAKER_PASS", hide_env_values = true)]
    pub password: Option<String>,

    /// Database used when a call names none
    #[arg(long, env = "FILEMAKER_DATABASE")]
    pub database: Option<String>,

    /// Known databases, comma-separated. Defaults to the practice's twelve files.
    #[arg(
        long = "databases",
        value_name = "NAMES",
        env = "FILEMAKER_DATABASES",
        value_delimiter = ','
    )]
    pub databases: Vec<String>,

    /// Database backend
    #[arg(long, value_enum, default_value = "odbc", env = "MCP_DRIVER")]
    pub driver: DriverKind,

    /// Transport mode (stdio or http)
    #[arg(
        short,
        long,
        value_enum,
        default_value = "stdio",
        env = "MCP_TRANSPORT"
    )]
    pub transport: TransportMode,

    /// HTTP host to bind to (only used with http transport)
    #[arg(long, default_value = DEFAULT_HTTP_HOST, env = "MCP_HTTP_HOST")]
    pub http_host: String,

    /// HTTP port to bind to (only used with http transport)
    #[arg(long, default_value_t = DEFAULT_HTTP_PORT, env = "MCP_HTTP_PORT")]
    pub http_port: u16,

    /// MCP endpoint path (only used with http transport)
    #[arg(long, default_value = DEFAULT_MCP_ENDPOINT, env = "MCP_ENDPOINT")]
    pub mcp_endpoint: String,

    /// Query timeout in seconds
    #[arg(
        long,
        default_value_t = DEFAULT_QUERY_TIMEOUT_SECS,
        env = "MCP_QUERY_TIMEOUT"
    )]
    pub query_timeout: u64,

    /// Connection timeout in seconds
    #[arg(
        long,
        default_value_t = DEFAULT_CONNECT_TIMEOUT_SECS,
        env = "MCP_CONNECT_TIMEOUT"
    )]
    pub connect_timeout: u64,

    /// Maximum database calls in flight at once
    #[arg(
        long,
        default_value_t = DEFAULT_MAX_CONCURRENT_QUERIES,
        env = "MCP_MAX_CONCURRENT_QUERIES"
    )]
    pub max_concurrent_queries: usize,

    /// Upper bound for any caller-supplied row limit
    #[arg(long, default_value_t = MAX_ROW_LIMIT, env = "MCP_MAX_ROW_LIMIT")]
    pub max_row_limit: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "MCP_LOG_LEVEL")]
    pub log_level: String,

    /// Enable JSON logging format
    #[arg(long, env = "MCP_JSON_LOGS")]
    pub json_logs: bool,

    /// Enable logging output (disabled by default to avoid interfering with stdio transport)
    #[arg(long, env = "MCP_ENABLE_LOGS")]
    pub enable_logs: bool,

    /// Test the connection, list tables and exit
    #[arg(long)]
    pub check: bool,
}

impl Config {
    /// Parse configuration from command line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Create a default configuration (useful for testing).
    pub fn default_config() -> Self {
        Self {
            dsn: DEFAULT_DSN.to_string(),
            user: None,
            password: None,
            database: None,
            databases: Vec::new(),
            driver: DriverKind::Odbc,
            transport: TransportMode::Stdio,
            http_host: DEFAULT_HTTP_HOST.to_string(),
            http_port: DEFAULT_HTTP_PORT,
            mcp_endpoint: DEFAULT_MCP_ENDPOINT.to_string(),
            query_timeout: DEFAULT_QUERY_TIMEOUT_SECS,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT_SECS,
            max_concurrent_queries: DEFAULT_MAX_CONCURRENT_QUERIES,
            max_row_limit: MAX_ROW_LIMIT,
            log_level: "info".to_string(),
            json_logs: false,
            enable_logs: false,
            check: false,
        }
    }

    /// The immutable connection settings handed to the driver.
    pub fn connection_config(&self) -> ConnectionConfig {
        let config = ConnectionConfig::new(self.dsn.trim()).with_credentials(
            self.user.clone().unwrap_or_default(),
            self.password.clone().unwrap_or_default(),
        );
        match self.database.as_deref() {
            Some(database) => config.with_default_database(database.trim()),
            None => config,
        }
    }

    /// Known database names: the configured list, or the built-in catalog.
    ///
    /// Names are trimmed; blanks and repeats are dropped.
    pub fn database_catalog(&self) -> Vec<String> {
        let mut catalog: Vec<String> = Vec::new();
        for name in &self.databases {
            let name = name.trim();
            if !name.is_empty() && !catalog.iter().any(|n| n == name) {
                catalog.push(name.to_string());
            }
        }

        if catalog.is_empty() {
            DEFAULT_DATABASES.iter().map(|s| s.to_string()).collect()
        } else {
            catalog
        }
    }

    /// Database opened by `--check`: the default database, else the first
    /// catalog entry.
    pub fn check_database(&self) -> String {
        self.database
            .clone()
            .filter(|d| !d.is_empty())
            .or_else(|| self.database_catalog().into_iter().next())
            .unwrap_or_default()
    }

    /// Get the HTTP bind address.
    pub fn http_bind_addr(&self) -> String {
        format!("{}:{}", self.http_host, self.http_port)
    }

    /// Get query timeout as Duration.
    pub fn query_timeout_duration(&self) -> Duration {
        Duration::from_secs(self.query_timeout)
    }

    /// Get connect timeout as Duration.
    pub fn connect_timeout_duration(&self) -> Duration {
        Duration::from_secs(self.connect_timeout)
    }

    /// Executor carrying the configured timeout, row cap and concurrency.
    pub fn executor(&self) -> QueryExecutor {
        QueryExecutor::with_settings(
            self.query_timeout_duration(),
            self.max_row_limit,
            self.max_concurrent_queries,
        )
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.dsn.trim().is_empty() {
            return Err("--dsn must not be empty".to_string());
        }
        if self.max_concurrent_queries == 0 {
            return Err("--max-concurrent-queries must be greater than 0".to_string());
        }
        if self.max_row_limit == 0 {
            return Err("--max-row-limit must be greater than 0".to_string());
        }
        if self.max_row_limit > MAX_ROW_LIMIT {
            return Err(format!(
                "--max-row-limit cannot exceed {}",
                MAX_ROW_LIMIT
            ));
        }
        if self.query_timeout == 0 || self.connect_timeout == 0 {
            return Err("timeouts must be greater than 0".to_string());
        }
        if !self.mcp_endpoint.starts_with('/') {
            return Err("--mcp-endpoint must start with '/'".to_string());
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::default_config()
    }
}
