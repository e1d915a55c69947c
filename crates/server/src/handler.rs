//! MCP server handler implementation.
//!
//! This module defines the main server handler that
//! routes tool calls to the appropriate implementations.
use crate::state::AppState;
use crate::tools::cache::{
    CacheAddParams, CacheCancelParams, CacheDownloadParams, CacheLookupParams, CacheRemoveParams, CacheStatusParams,
    add_impl, cancel_impl, download_impl, lookup_impl, remove_impl, status_impl,
};

use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{
        tool::{ToolCallContext, ToolRouter},
        wrapper::Parameters,
    },
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
        ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
};

/// The main MCP server handler for satchel.
#[derive(Clone)]
pub struct SatchelServer {
    tool_router: ToolRouter<Self>,
    state: AppState,
}

/// Tool router implementation using the #[tool_router] macro.
///
/// This macro generates the routing logic that maps tool names to handler methods.
#[tool_router]
impl SatchelServer {
    /// Create a new server handler over the given cache state.
    pub fn new(state: AppState) -> Self {
        Self { tool_router: Self::tool_router(), state }
    }

    #[tool(
        description = "Cache an article for offline reading. Records its content, resource lists, stylesheets, scripts and image metadata as one group, downloads them, and queues its images in the background."
    )]
    async fn cache_add(&self, params: Parameters<CacheAddParams>) -> Result<CallToolResult, McpError> {
        add_impl(&self.state, params.0).await
    }

    #[tool(description = "Report whether every must-have item of a cache group is downloaded, with item counts.")]
    async fn cache_status(&self, params: Parameters<CacheStatusParams>) -> Result<CallToolResult, McpError> {
        status_impl(&self.state, params.0).await
    }

    #[tool(description = "Download the items of a cache group that are not downloaded yet.")]
    async fn cache_download(&self, params: Parameters<CacheDownloadParams>) -> Result<CallToolResult, McpError> {
        download_impl(&self.state, params.0).await
    }

    #[tool(description = "Cancel every in-flight fetch of a cache group.")]
    async fn cache_cancel(&self, params: Parameters<CacheCancelParams>) -> Result<CallToolResult, McpError> {
        cancel_impl(&self.state, params.0).await
    }

    /// Look up a URL in the cache.
    ///
    /// No network requests are made.
    #[tool(
        description = "Look up a URL in the offline cache. Falls back to another stored size of the same image, or another stored variant of the same article."
    )]
    async fn cache_lookup(&self, params: Parameters<CacheLookupParams>) -> Result<CallToolResult, McpError> {
        lookup_impl(&self.state, params.0).await
    }

    #[tool(description = "Remove a cache group and every stored item no other group uses.")]
    async fn cache_remove(&self, params: Parameters<CacheRemoveParams>) -> Result<CallToolResult, McpError> {
        remove_impl(&self.state, params.0).await
    }
}

impl ServerHandler for SatchelServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "satchel".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self, _request: Option<PaginatedRequestParam>, _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, rmcp::model::ErrorData> {
        Ok(ListToolsResult { meta: None, tools: self.tool_router.list_all(), next_cursor: None })
    }

    async fn call_tool(
        &self, request: CallToolRequestParam, context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, rmcp::model::ErrorData> {
        self.tool_router
            .call(ToolCallContext::new(self, request, context))
            .await
    }
}
