//! MCP (Model Context Protocol) client support
//!
//! Connects to the configured MCP servers over HTTP and exposes them to the
//! executor as tool sessions.

pub mod client;
pub mod transport;

use std::collections::HashMap;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;

use crate::config::{McpServerConfig, TransportKind};
use crate::hands::{ToolConnector, ToolSession};

pub use client::{CallToolResult, McpClient, ToolResultContent};
pub use transport::{HttpTransport, McpTransport, StreamableHttpTransport};

/// Opens one fresh MCP session per request, keyed by server name.
pub struct McpConnector {
    servers: HashMap<String, McpServerConfig>,
}

impl McpConnector {
    pub fn new(servers: HashMap<String, McpServerConfig>) -> Self {
        Self { servers }
    }
}

fn build_transport(config: &McpServerConfig) -> Box<dyn McpTransport> {
    match config.transport {
        TransportKind::StreamableHttp => Box::new(StreamableHttpTransport::new(&config.url)),
        TransportKind::Http => Box::new(HttpTransport::new(&config.url)),
    }
}

#[async_trait]
impl ToolConnector for McpConnector {
    async fn open_session(&self, server: &str) -> Result<Box<dyn ToolSession>> {
        let config = self
            .servers
            .get(server)
            .with_context(|| format!("No MCP server configured under '{}'", server))?;

        let mut client = McpClient::new(build_transport(config));
        client
            .initialize()
            .await
            .with_context(|| format!("Failed to open session on '{}' at {}", server, config.url))?;

        Ok(Box::new(client))
    }
}

#[async_trait]
impl ToolSession for McpClient {
    async fn call_tool(&mut self, name: &str, arguments: Value) -> Result<CallToolResult> {
        McpClient::call_tool(self, name, arguments).await
    }

    async fn close(&mut self) -> Result<()> {
        McpClient::close(self).await
    }
}
