//! MCP transport layer
//!
//! JSON-RPC 2.0 over HTTP, either plain request/response or the streamable HTTP
//! flavour with session ids and SSE-framed replies.

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

pub const SESSION_HEADER: &str = "mcp-session-id";

/// JSON-RPC 2.0 request
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    pub fn new(id: u64, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            method: method.into(),
            params,
        }
    }
}

/// JSON-RPC 2.0 response
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: Option<u64>,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<JsonRpcError>,
}

/// JSON-RPC 2.0 error
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(default)]
    pub data: Option<Value>,
}

impl std::fmt::Display for JsonRpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "JSON-RPC error {}: {}", self.code, self.message)
    }
}

/// Transport trait for MCP communication
#[async_trait]
pub trait McpTransport: Send {
    /// Send a request and wait for its response
    async fn send_request(&mut self, request: JsonRpcRequest) -> Result<JsonRpcResponse>;

    /// Send a notification (no response expected)
    async fn send_notification(&mut self, method: &str, params: Option<Value>) -> Result<()>;

    /// Close the transport
    async fn close(&mut self) -> Result<()>;
}

fn notification_body(method: &str, params: Option<Value>) -> Value {
    let mut body = serde_json::json!({
        "jsonrpc": "2.0",
        "method": method,
    });
    if let Some(params) = params {
        body["params"] = params;
    }
    body
}

/// Plain HTTP transport: one JSON body in, one JSON body out.
pub struct HttpTransport {
    url: String,
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl McpTransport for HttpTransport {
    async fn send_request(&mut self, request: JsonRpcRequest) -> Result<JsonRpcResponse> {
        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .context("Failed to send HTTP request to MCP server")?;

        if !response.status().is_success() {
            bail!("MCP server returned error status: {}", response.status());
        }

        response
            .json()
            .await
            .context("Failed to parse JSON-RPC response from MCP server")
    }

    async fn send_notification(&mut self, method: &str, params: Option<Value>) -> Result<()> {
        self.client
            .post(&self.url)
            .json(&notification_body(method, params))
            .send()
            .await
            .context("Failed to send notification to MCP server")?;
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Streamable HTTP transport. The server may answer with JSON or an SSE stream
/// and hands out a session id on `initialize` that must be echoed afterwards.
pub struct StreamableHttpTransport {
    url: String,
    client: reqwest::Client,
    session_id: Option<String>,
}

impl StreamableHttpTransport {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client: reqwest::Client::new(),
            session_id: None,
        }
    }

    fn post(&self, body: &impl Serialize) -> reqwest::RequestBuilder {
        let mut builder = self
            .client
            .post(&self.url)
            .header(ACCEPT, "application/json, text/event-stream")
            .json(body);
        if let Some(id) = &self.session_id {
            builder = builder.header(SESSION_HEADER, id);
        }
        builder
    }

    fn remember_session(&mut self, response: &reqwest::Response) {
        if let Some(id) = response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
        {
            if self.session_id.as_deref() != Some(id) {
                debug!(session = id, "MCP session established");
                self.session_id = Some(id.to_string());
            }
        }
    }
}

#[async_trait]
impl McpTransport for StreamableHttpTransport {
    async fn send_request(&mut self, request: JsonRpcRequest) -> Result<JsonRpcResponse> {
        let request_id = request.id;
        let response = self
            .post(&request)
            .send()
            .await
            .context("Failed to send HTTP request to MCP server")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("MCP server returned error status {}: {}", status, body);
        }
        self.remember_session(&response);

        let is_sse = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("text/event-stream"));
        let body = response
            .text()
            .await
            .context("Failed to read MCP server response")?;

        if !is_sse {
            return serde_json::from_str(&body)
                .context("Failed to parse JSON-RPC response from MCP server");
        }

        for message in parse_sse_messages(&body) {
            // Server-initiated requests and notifications share the stream.
            if message.get("id").and_then(Value::as_u64) != Some(request_id) {
                continue;
            }
            if message.get("result").is_none() && message.get("error").is_none() {
                continue;
            }
            return serde_json::from_value(message).context("Failed to parse JSON-RPC response");
        }

        bail!("MCP server stream ended without a response to request {request_id}")
    }

    async fn send_notification(&mut self, method: &str, params: Option<Value>) -> Result<()> {
        let response = self
            .post(&notification_body(method, params))
            .send()
            .await
            .context("Failed to send notification to MCP server")?;

        if !response.status().is_success() {
            bail!("MCP server rejected notification {method}: {}", response.status());
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        let Some(id) = self.session_id.take() else {
            return Ok(());
        };

        let response = self
            .client
            .delete(&self.url)
            .header(SESSION_HEADER, &id)
            .send()
            .await
            .context("Failed to close MCP session")?;

        // Servers may refuse explicit termination; the session then just expires.
        let status = response.status();
        if !status.is_success() && status != StatusCode::METHOD_NOT_ALLOWED {
            bail!("MCP server returned {} closing session", status);
        }
        Ok(())
    }
}

/// Extracts the JSON payloads of every event in an SSE body.
pub fn parse_sse_messages(body: &str) -> Vec<Value> {
    let mut messages = Vec::new();
    let mut data = String::new();

    let mut flush = |data: &mut String| {
        if !data.is_empty() {
            if let Ok(value) = serde_json::from_str::<Value>(data) {
                messages.push(value);
            }
            data.clear();
        }
    };

    for line in body.lines() {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if line.is_empty() {
            flush(&mut data);
        } else if let Some(rest) = line.strip_prefix("data:") {
            if !data.is_empty() {
                data.push('\n');
            }
            data.push_str(rest.strip_prefix(' ').unwrap_or(rest));
        }
    }
    flush(&mut data);

    messages
}
