//! MCP service implementation using rmcp.
//!
//! `GatewayService` serves the operation catalog as MCP tools and each known
//! database as a `filemaker://<name>` resource describing its schema.

use crate::db::ConnectionRegistry;
use crate::error::DbError;
use crate::tools::{OperationRouter, ToolContext};
use rmcp::{
    ErrorData as McpError, RoleServer, ServerHandler,
    model::{
        AnnotateAble, CallToolRequestParam, CallToolResult, Content, Implementation, JsonObject,
        ListResourcesResult, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
        RawResource, ReadResourceRequestParam, ReadResourceResult, Resource, ResourceContents,
        ServerCapabilities, ServerInfo,
    },
    service::RequestContext,
};
use std::sync::Arc;
use tracing::warn;

/// URI scheme of the database schema resources.
pub const RESOURCE_SCHEME: &str = "filemaker://";

#[derive(Clone)]
pub struct GatewayService {
    router: OperationRouter,
}

impl GatewayService {
    pub fn new(ctx: ToolContext) -> Self {
        Self {
            router: OperationRouter::new(ctx),
        }
    }

    pub fn router(&self) -> &OperationRouter {
        &self.router
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        self.router.context().registry()
    }

    /// Run a tool and render its envelope as the tool result.
    ///
    /// Ordinary failures are a normal result whose text says `success: false`;
    /// only an unknown tool name sets the result's error flag.
    pub async fn call(&self, name: &str, arguments: Option<JsonObject>) -> CallToolResult {
        let envelope = self.router.call(name, arguments).await;
        let content = vec![Content::text(envelope.to_json_text())];
        if envelope.is_unknown_operation() {
            CallToolResult::error(content)
        } else {
            CallToolResult::success(content)
        }
    }

    /// One schema resource per known database.
    pub fn resources(&self) -> Vec<Resource> {
        self.router
            .context()
            .databases()
            .iter()
            .map(|database| {
                let mut resource = RawResource::new(
                    format!("{}{}", RESOURCE_SCHEME, database),
                    format!("FileMaker: {}", database),
                );
                resource.description = Some(format!("FileMaker database: {}.fp7", database));
                resource.mime_type = Some("application/json".to_string());
                resource.no_annotation()
            })
            .collect()
    }

    /// Read a `filemaker://<database>` resource.
    ///
    /// A database that cannot be read still yields content, `{"error": ...}`.
    pub async fn read(&self, uri: &str) -> Result<ReadResourceResult, McpError> {
        let database = uri
            .strip_prefix(RESOURCE_SCHEME)
            .filter(|name| !name.is_empty())
            .ok_or_else(|| DbError::validation(format!("Unknown resource URI: {}", uri)))?;

        let text = match self.router.context().schema(database).await {
            Ok(schema) => serde_json::to_string_pretty(&schema),
            Err(e) => {
                warn!(database = %database, error = %e, "Failed to read schema resource");
                serde_json::to_string_pretty(&serde_json::json!({ "error": e.to_string() }))
            }
        }
        .map_err(DbError::from)?;

        Ok(ReadResourceResult {
            contents: vec![ResourceContents::text(text, uri)],
        })
    }
}

impl ServerHandler for GatewayService {
    async fn call_tool(
        &self,
        request: CallToolRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        Ok(self.call(&request.name, request.arguments).await)
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, McpError> {
        Ok(ListToolsResult::with_all_items(self.router.tools()))
    }

    async fn list_resources(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListResourcesResult, McpError> {
        Ok(ListResourcesResult::with_all_items(self.resources()))
    }

    async fn read_resource(
        &self,
        request: ReadResourceRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<ReadResourceResult, McpError> {
        self.read(&request.uri).await
    }

    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2025_03_26,
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .enable_resources()
                .build(),
            server_info: Implementation {
                name: "filemaker-mcp-server".to_owned(),
                title: Some("FileMaker MCP Server".to_owned()),
                version: env!("CARGO_PKG_VERSION").to_owned(),
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Tools for the practice's FileMaker databases.\n\
                \n\
                ## Workflow\n\
                1. Call `list_all_databases` or `list_tables` to see what exists\n\
                2. Call `describe_table` before writing SQL; field names often contain spaces\n\
                3. Use `query` for ad-hoc SQL, or the patient/appointment/transaction lookups\n\
                \n\
                ## FileMaker SQL\n\
                - Quote field names with spaces or symbols: \"Last Name\", \"patient id#\"\n\
                - There is no LIMIT or FETCH FIRST; pass the `limit` argument instead\n\
                - GROUP BY is unreliable; fetch rows and count them instead\n\
                \n\
                ## Results\n\
                Every tool returns JSON with `success`. Failures carry `error` and `error_type`."
                    .to_string(),
            ),
        }
    }
}
