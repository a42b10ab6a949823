//! MCP JSON-RPC dispatcher
//!
//! [`McpServer`] is the [`MessageHandler`] every session transport delivers
//! to. It is stateless across messages: protocol negotiation happens per
//! `initialize` call and identity comes in with each message.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::mcp::auth::AuthContext;
use crate::mcp::transport::MessageHandler;
use crate::mcp::types::{
    CallToolParams, Implementation, InitializeParams, InitializeResponse, JsonRpcRequest,
    JsonRpcResponse, ListToolsResponse, ServerCapabilities, INTERNAL_ERROR, INVALID_PARAMS,
    LATEST_PROTOCOL_VERSION, METHOD_INITIALIZE, METHOD_NOT_FOUND, METHOD_PING, METHOD_TOOLS_CALL,
    METHOD_TOOLS_LIST, SUPPORTED_PROTOCOL_VERSIONS,
};
use crate::tools::ToolRegistry;

/// Advertised server name.
pub const SERVER_NAME: &str = "WhoAmI";
/// Advertised server version.
pub const SERVER_VERSION: &str = "0.0.0";

/// Dispatches JSON-RPC requests to lifecycle handlers and tools.
#[derive(Debug)]
pub struct McpServer {
    info: Implementation,
    tools: Arc<ToolRegistry>,
}

impl McpServer {
    /// Create a server exposing `tools`.
    pub fn new(tools: Arc<ToolRegistry>) -> Self {
        Self {
            info: Implementation {
                name: SERVER_NAME.to_string(),
                version: SERVER_VERSION.to_string(),
            },
            tools,
        }
    }

    fn initialize(&self, params: Option<Value>) -> Result<Value, (i64, String)> {
        let params: InitializeParams = parse_params(params)?;
        let protocol_version = negotiate_version(&params.protocol_version);

        if let Some(client) = &params.client_info {
            tracing::info!(client = %client.name, version = %client.version, protocol = %protocol_version, "Client initialized");
        }

        let response = InitializeResponse {
            protocol_version,
            capabilities: ServerCapabilities {
                tools: Some(json!({})),
            },
            server_info: self.info.clone(),
        };
        to_value(&response)
    }

    fn list_tools(&self) -> Result<Value, (i64, String)> {
        to_value(&ListToolsResponse {
            tools: self.tools.all_definitions(),
        })
    }

    async fn call_tool(
        &self,
        params: Option<Value>,
        auth: Option<&AuthContext>,
    ) -> Result<Value, (i64, String)> {
        let params: CallToolParams = parse_params(params)?;
        let tool = self
            .tools
            .get(&params.name)
            .ok_or_else(|| (INVALID_PARAMS, format!("Unknown tool: {}", params.name)))?;

        tracing::debug!(tool = %params.name, authenticated = auth.is_some(), "Calling tool");

        let args = params.arguments.unwrap_or_else(|| json!({}));
        let result = tool
            .execute(args, auth)
            .await
            .map_err(|e| (INTERNAL_ERROR, e.to_string()))?;
        to_value(&result)
    }
}

#[async_trait]
impl MessageHandler for McpServer {
    async fn handle(
        &self,
        request: JsonRpcRequest,
        auth: Option<AuthContext>,
    ) -> Option<JsonRpcResponse> {
        let Some(id) = request.id else {
            tracing::debug!(method = %request.method, "Notification received");
            return None;
        };

        let outcome = match request.method.as_str() {
            METHOD_INITIALIZE => self.initialize(request.params),
            METHOD_PING => Ok(json!({})),
            METHOD_TOOLS_LIST => self.list_tools(),
            METHOD_TOOLS_CALL => self.call_tool(request.params, auth.as_ref()).await,
            other => Err((METHOD_NOT_FOUND, format!("Method not found: {}", other))),
        };

        Some(match outcome {
            Ok(result) => JsonRpcResponse::success(id, result),
            Err((code, message)) => {
                tracing::debug!(code, message = %message, "Request failed");
                JsonRpcResponse::failure(id, code, message)
            }
        })
    }
}

/// The client's requested version when supported, otherwise the latest.
pub fn negotiate_version(requested: &str) -> String {
    if SUPPORTED_PROTOCOL_VERSIONS.contains(&requested) {
        requested.to_string()
    } else {
        LATEST_PROTOCOL_VERSION.to_string()
    }
}

fn parse_params<T: serde::de::DeserializeOwned>(params: Option<Value>) -> Result<T, (i64, String)> {
    let params = params.ok_or_else(|| (INVALID_PARAMS, "Missing params".to_string()))?;
    serde_json::from_value(params).map_err(|e| (INVALID_PARAMS, format!("Invalid params: {}", e)))
}

fn to_value<T: serde::Serialize>(value: &T) -> Result<Value, (i64, String)> {
    serde_json::to_value(value).map_err(|e| (INTERNAL_ERROR, e.to_string()))
}
