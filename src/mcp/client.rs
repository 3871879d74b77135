//! MCP client implementation
//!
//! Just enough of the Model Context Protocol to open a session and call tools.

use anyhow::{Context, Result, bail};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use super::transport::{JsonRpcRequest, McpTransport};

/// MCP protocol version
pub const MCP_PROTOCOL_VERSION: &str = "2025-03-26";

/// Client info for initialization
#[derive(Debug, Clone, Serialize)]
pub struct ClientInfo {
    pub name: String,
    pub version: String,
}

impl Default for ClientInfo {
    fn default() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Server info returned during initialization
#[derive(Debug, Clone, Deserialize)]
pub struct ServerInfo {
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
}

/// Initialize result
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResult {
    pub protocol_version: String,
    #[serde(default)]
    pub capabilities: Value,
    pub server_info: ServerInfo,
}

/// Tool call result content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResultContent {
    #[serde(rename = "type")]
    pub content_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    /// `resource`, `uri`, `annotations`, `_meta` and anything newer.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Tool call result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallToolResult {
    #[serde(default)]
    pub content: Vec<ToolResultContent>,
    #[serde(default)]
    pub is_error: bool,
    /// `structuredContent`, `_meta` and anything newer.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CallToolResult {
    /// Text of the first text content item, if any.
    pub fn first_text(&self) -> Option<&str> {
        self.content
            .iter()
            .find(|c| c.content_type == "text")
            .and_then(|c| c.text.as_deref())
    }
}

/// MCP Client
pub struct McpClient {
    transport: Box<dyn McpTransport>,
    request_id: u64,
    server_info: Option<ServerInfo>,
}

impl McpClient {
    /// Create a new MCP client with the given transport
    pub fn new(transport: Box<dyn McpTransport>) -> Self {
        Self {
            transport,
            request_id: 1,
            server_info: None,
        }
    }

    fn next_id(&mut self) -> u64 {
        let id = self.request_id;
        self.request_id += 1;
        id
    }

    /// Send a request and get the result
    async fn request<T: DeserializeOwned>(
        &mut self,
        method: &str,
        params: Option<Value>,
    ) -> Result<T> {
        let request = JsonRpcRequest::new(self.next_id(), method, params);
        let response = self.transport.send_request(request).await?;

        if let Some(error) = response.error {
            bail!("MCP error: {}", error);
        }

        let result = response.result.context("MCP response missing result")?;
        serde_json::from_value(result).context("Failed to parse MCP result")
    }

    /// Initialize the connection with the MCP server
    pub async fn initialize(&mut self) -> Result<InitializeResult> {
        let params = serde_json::json!({
            "protocolVersion": MCP_PROTOCOL_VERSION,
            "capabilities": {},
            "clientInfo": ClientInfo::default()
        });

        let result: InitializeResult = self
            .request("initialize", Some(params))
            .await
            .context("Failed to initialize MCP connection")?;

        self.transport
            .send_notification("notifications/initialized", None)
            .await?;

        debug!(
            server = %result.server_info.name,
            protocol = %result.protocol_version,
            "MCP session initialized"
        );
        self.server_info = Some(result.server_info.clone());

        Ok(result)
    }

    /// Call a tool on the server
    pub async fn call_tool(&mut self, name: &str, arguments: Value) -> Result<CallToolResult> {
        if self.server_info.is_none() {
            bail!("MCP client not initialized");
        }

        let params = serde_json::json!({
            "name": name,
            "arguments": arguments
        });

        self.request("tools/call", Some(params))
            .await
            .with_context(|| format!("Failed to call MCP tool '{}'", name))
    }

    pub async fn close(&mut self) -> Result<()> {
        self.server_info = None;
        self.transport.close().await
    }
}
