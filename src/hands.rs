use std::sync::Arc;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::{debug, error, info, warn};

use crate::mcp::CallToolResult;
use crate::serialize::{Loggable, safe_serialize};
use crate::types::{AgentState, EXTRACT_HTML_TOOL, RunResult, StepRecord};

/// An open session on a tool server.
#[async_trait]
pub trait ToolSession: Send {
    async fn call_tool(&mut self, name: &str, arguments: Value) -> Result<CallToolResult>;

    async fn close(&mut self) -> Result<()>;
}

/// Opens sessions on named tool servers.
#[async_trait]
pub trait ToolConnector: Send + Sync {
    async fn open_session(&self, server: &str) -> Result<Box<dyn ToolSession>>;
}

/// Executes decided steps against the browser tool server.
pub struct Hands {
    connector: Arc<dyn ToolConnector>,
    server: String,
}

impl Hands {
    pub fn new(connector: Arc<dyn ToolConnector>, server: impl Into<String>) -> Self {
        Self {
            connector,
            server: server.into(),
        }
    }

    /// Run `state.next_step` and fold the outcome into `state`.
    pub async fn execute(&self, state: &mut AgentState) {
        let next_step = state.next_step.clone();

        let Some(tool) = next_step.tool_name() else {
            warn!("No tool found, stopping execution");
            state.done = true;
            state.result = RunResult::Fail;
            return;
        };

        let args = Value::Object(next_step.args.clone());
        info!(tool, args = %args, "Executing");

        let (result, html) = match self.run_tool(tool, args, &state.last_html).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(tool, error = %format!("{:#}", e), "MCP execution error");
                state.done = true;
                state.result = RunResult::Fail;
                return;
            }
        };

        if result.is_error {
            warn!(tool, content = ?result.first_text(), "Tool reported an error");
        } else {
            info!(tool, "Tool executed successfully");
        }

        state.step_history.push(StepRecord {
            tool: tool.to_string(),
            args: next_step.args.clone(),
            reason: next_step.reason.clone(),
            result: safe_serialize(&Loggable::structured(&result)),
            html_length: html.chars().count(),
        });
        state.last_html = html;
        state.done = next_step.done;
        if next_step.done {
            state.result = RunResult::Pass;
        }
    }

    /// One session per step: call the tool, then grab a fresh page snapshot.
    async fn run_tool(
        &self,
        tool: &str,
        args: Value,
        previous_html: &str,
    ) -> Result<(CallToolResult, String)> {
        let mut session = self.connector.open_session(&self.server).await?;

        let outcome = match session.call_tool(tool, args).await {
            Ok(result) => {
                let html = match extract_html(session.as_mut()).await {
                    Ok(html) => html,
                    Err(e) => {
                        warn!(error = %format!("{:#}", e), "Failed to extract HTML");
                        previous_html.to_string()
                    }
                };
                Ok((result, html))
            }
            Err(e) => Err(e),
        };

        if let Err(e) = session.close().await {
            debug!(error = %format!("{:#}", e), "Failed to close tool session");
        }

        outcome
    }
}

async fn extract_html(session: &mut dyn ToolSession) -> Result<String> {
    let snapshot = session.call_tool(EXTRACT_HTML_TOOL, json!({})).await?;
    if snapshot.is_error {
        return Err(anyhow!(
            "{} failed: {}",
            EXTRACT_HTML_TOOL,
            snapshot.first_text().unwrap_or("no details")
        ));
    }
    snapshot
        .first_text()
        .map(str::to_string)
        .ok_or_else(|| anyhow!("{} returned no text content", EXTRACT_HTML_TOOL))
}
