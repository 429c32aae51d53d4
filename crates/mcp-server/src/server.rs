//! MCP handler exposing the synthesized QueryPie tools.

use querypie_openapi_tools::dispatch::Dispatcher;
use querypie_openapi_tools::error::OpenApiToolsError;
use querypie_openapi_tools::tool::ToolDefinition;
use querypie_openapi_tools::version::Version;
use rmcp::ErrorData;
use rmcp::RoleServer;
use rmcp::ServerHandler;
use rmcp::model::{
    CallToolRequestParams, CallToolResult, Implementation, JsonObject, ListToolsResult,
    PaginatedRequestParams, ProtocolVersion, ServerCapabilities, ServerInfo, Tool,
};
use rmcp::service::RequestContext;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

pub const SERVER_NAME: &str = "mcp-querypie";

#[derive(Clone)]
pub struct QueryPieServer {
    inner: Arc<Inner>,
}

struct Inner {
    tools: HashMap<String, ToolDefinition>,
    /// Advertised list, in document order.
    listed: Vec<Tool>,
    dispatcher: Dispatcher,
    target_version: Version,
}

impl QueryPieServer {
    /// Index `tools` by name. A later tool with an already-seen name replaces the earlier one.
    #[must_use]
    pub fn new(tools: Vec<ToolDefinition>, dispatcher: Dispatcher, target_version: Version) -> Self {
        let mut order: Vec<String> = Vec::with_capacity(tools.len());
        let mut by_name: HashMap<String, ToolDefinition> = HashMap::with_capacity(tools.len());

        for tool in tools {
            if by_name.contains_key(&tool.name) {
                tracing::warn!("Duplicate operationId '{}'; keeping the last definition", tool.name);
            } else {
                order.push(tool.name.clone());
            }
            by_name.insert(tool.name.clone(), tool);
        }

        let listed = order
            .iter()
            .filter_map(|name| by_name.get(name))
            .map(ToolDefinition::to_mcp_tool)
            .collect();

        Self {
            inner: Arc::new(Inner {
                tools: by_name,
                listed,
                dispatcher,
                target_version,
            }),
        }
    }

    #[must_use]
    pub fn list(&self) -> Vec<Tool> {
        self.inner.listed.clone()
    }

    /// Dispatch one tool call.
    ///
    /// Upstream responses with status 400 or above come back as a successful call with
    /// `isError: true`; only a failure to complete the exchange is a protocol error.
    ///
    /// # Errors
    ///
    /// `invalid_params` for an unknown tool name, `internal_error` if the request could not be
    /// completed.
    pub async fn call(&self, name: &str, arguments: JsonObject) -> Result<CallToolResult, ErrorData> {
        let Some(tool) = self.inner.tools.get(name) else {
            return Err(ErrorData::invalid_params(format!("Tool not found: {name}"), None));
        };

        tracing::info!(tool = %name, "Calling tool");
        let outcome = self
            .inner
            .dispatcher
            .invoke(tool, &arguments)
            .await
            .map_err(map_dispatch_error)?;
        if outcome.is_error {
            tracing::debug!(tool = %name, status = outcome.status, "Upstream returned an error status");
        }
        Ok(outcome.into_call_tool_result())
    }
}

fn map_dispatch_error(e: OpenApiToolsError) -> ErrorData {
    tracing::warn!("Tool call failed: {e}");
    ErrorData::internal_error(e.to_string(), None)
}

impl ServerHandler for QueryPieServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: SERVER_NAME.to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                ..Default::default()
            },
            instructions: Some(format!(
                "Tools call the QueryPie {} REST API at {}. Tool names are QueryPie operationIds.",
                self.inner.target_version,
                self.inner.dispatcher.base_url()
            )),
        }
    }

    fn list_tools(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> impl Future<Output = Result<ListToolsResult, ErrorData>> + Send + '_ {
        std::future::ready(Ok(ListToolsResult {
            tools: self.list(),
            ..Default::default()
        }))
    }

    fn call_tool(
        &self,
        request: CallToolRequestParams,
        _context: RequestContext<RoleServer>,
    ) -> impl Future<Output = Result<CallToolResult, ErrorData>> + Send + '_ {
        async move {
            self.call(&request.name, request.arguments.unwrap_or_default())
                .await
        }
    }
}
