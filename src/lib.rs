//! FileMaker MCP Server Library
//!
//! MCP (Model Context Protocol) tools and resources for AI assistants to read
//! and write a practice's FileMaker databases over ODBC.

pub mod config;
pub mod db;
pub mod error;
pub mod mcp;
pub mod models;
pub mod tools;
pub mod transport;

pub use config::Config;
pub use error::DbError;
pub use mcp::GatewayService;
