//! MCP server integration module.
//!
//! This module connects the MCP protocol to the operation router using the
//! rmcp framework.

pub mod service;

pub use service::{GatewayService, RESOURCE_SCHEME};
