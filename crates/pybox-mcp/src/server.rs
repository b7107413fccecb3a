//! PyboxServer - MCP server that exposes the execution engine as a tool.
//!
//! This module implements the core MCP server manually implementing
//! ServerHandler to expose Python execution to AI agents.

use crate::config::{PyboxConfig, MAX_SOURCE_BYTES};
use crate::types::ExecutePythonParams;

use pybox_engine::Gateway;
use rmcp::{
    handler::server::ServerHandler,
    model::*,
    service::{RequestContext, RoleServer},
    ErrorData,
};
use schemars::schema_for;
use std::sync::Arc;

/// MCP server for pybox execution.
///
/// The server holds one shared [`Gateway`]; every tool call is an
/// independent invocation with its own isolated context inside the engine.
#[derive(Clone)]
pub struct PyboxServer {
    /// Execution gateway from pybox-engine
    gateway: Arc<Gateway>,

    /// Configuration
    config: PyboxConfig,
}

impl PyboxServer {
    /// Create a new PyboxServer with the given configuration.
    pub fn new(config: PyboxConfig) -> Self {
        let gateway = Arc::new(Gateway::new(config.engine_config()));
        Self { gateway, config }
    }

    /// Get a reference to the execution gateway.
    pub fn gateway(&self) -> &Gateway {
        &self.gateway
    }

    /// Get a cloned Arc to the execution gateway.
    ///
    /// Use this when you need to share the gateway across tasks (e.g. for
    /// the HTTP health endpoint).
    pub fn gateway_arc(&self) -> Arc<Gateway> {
        Arc::clone(&self.gateway)
    }

    /// Get a reference to the configuration.
    pub fn config(&self) -> &PyboxConfig {
        &self.config
    }

    /// Truncate submitted source for logging.
    fn truncate_for_log(s: &str, max_len: usize) -> String {
        if s.len() <= max_len {
            s.to_string()
        } else {
            let mut end = max_len;
            while end > 0 && !s.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... ({} bytes total)", &s[..end], s.len())
        }
    }

    /// Validate input size.
    fn validate_size(content: &str, max_bytes: usize, field_name: &str) -> Result<(), String> {
        if content.len() > max_bytes {
            Err(format!(
                "{} exceeds maximum size ({} bytes > {} bytes)",
                field_name,
                content.len(),
                max_bytes
            ))
        } else {
            Ok(())
        }
    }

    /// Helper to create error result
    fn error_result(message: impl Into<String>) -> CallToolResult {
        CallToolResult::error(vec![Content::text(message.into())])
    }

    /// Convert schemars RootSchema to rmcp JsonObject
    fn schema_to_json_object<T: schemars::JsonSchema>(
    ) -> Arc<serde_json::Map<String, serde_json::Value>> {
        let schema = schema_for!(T);
        let json = serde_json::to_value(&schema.schema).unwrap_or_else(|_| serde_json::json!({}));
        match json {
            serde_json::Value::Object(map) => Arc::new(map),
            _ => Arc::new(serde_json::Map::new()),
        }
    }

    // ========================================================================
    // Tool Implementations
    // ========================================================================

    async fn handle_execute_python(
        &self,
        args: Option<serde_json::Map<String, serde_json::Value>>,
    ) -> CallToolResult {
        let params: ExecutePythonParams = match args
            .map(|a| serde_json::from_value(serde_json::Value::Object(a)))
            .transpose()
        {
            Ok(Some(p)) => p,
            _ => return Self::error_result("Missing required parameter: code"),
        };

        if let Err(e) = Self::validate_size(&params.code, MAX_SOURCE_BYTES, "code") {
            return Self::error_result(e);
        }

        tracing::info!(
            code_len = params.code.len(),
            code = %Self::truncate_for_log(&params.code, 100),
            "Executing Python source"
        );

        // The gateway always resolves to a string; faults arrive as
        // diagnostic text inside it, never as a protocol error.
        let output = self.gateway.execute(&params.code).await;
        CallToolResult::success(vec![Content::text(output)])
    }

    /// Build the list of available tools
    fn build_tools_list() -> Vec<Tool> {
        vec![Tool::new(
            "execute_python",
            "Execute Python code in an isolated runtime and return its output. \
             Errors are returned as diagnostic text appended to any partial output.",
            Self::schema_to_json_object::<ExecutePythonParams>(),
        )]
    }
}

// ============================================================================
// ServerHandler Implementation
// ============================================================================

impl ServerHandler for PyboxServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(
                "Pybox MCP Server - Execute Python code in an isolated runtime. \
                 Call execute_python with the source text; the result is the \
                 program's output, with any error appended as diagnostic text. \
                 Each call runs in a fresh context; nothing persists between calls."
                    .into(),
            ),
        }
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParam>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, ErrorData> {
        Ok(ListToolsResult {
            tools: Self::build_tools_list(),
            next_cursor: None,
            meta: None,
        })
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParam,
        _context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, ErrorData> {
        let result = match request.name.as_ref() {
            "execute_python" => self.handle_execute_python(request.arguments).await,
            _ => Self::error_result(format!("Unknown tool: {}", request.name)),
        };

        Ok(result)
    }
}
