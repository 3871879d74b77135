use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::config::ReasonerConfig;
use crate::types::{AgentState, ChatMessage, HTML_PROMPT_MAX_CHARS, NextStep, StepRecord};

const REPEATED_STEP_REASON: &str = "Repeated step detected.";

/// Something that turns a prompt into free text.
#[async_trait]
pub trait Reasoner: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;
}

/// Google Gemini `generateContent` backend.
pub struct GeminiReasoner {
    client: Client,
    config: ReasonerConfig,
}

impl GeminiReasoner {
    pub fn new(config: ReasonerConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }
}

#[async_trait]
impl Reasoner for GeminiReasoner {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let url = format!(
            "{}/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        );

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.config.api_key)
            .json(&json!({
                "contents": [{"role": "user", "parts": [{"text": prompt}]}],
                "generationConfig": {"temperature": self.config.temperature},
            }))
            .send()
            .await
            .context("Failed to reach Gemini API")?;

        let status = response.status();
        let json_resp: Value = response.json().await?;

        if !status.is_success() {
            let err_msg = json_resp["error"]["message"]
                .as_str()
                .unwrap_or("Unknown API error");
            return Err(anyhow!("Gemini API error ({}): {}", status, err_msg));
        }

        gemini_text(&json_resp).ok_or_else(|| anyhow!("No content in LLM response: {}", json_resp))
    }
}

fn gemini_text(response: &Value) -> Option<String> {
    let parts = response["candidates"][0]["content"]["parts"].as_array()?;
    let text: String = parts.iter().filter_map(|p| p["text"].as_str()).collect();
    (!text.is_empty()).then_some(text)
}

/// Decides the next browser step by asking the model.
pub struct Brain {
    reasoner: Box<dyn Reasoner>,
}

impl Brain {
    pub fn new(reasoner: Box<dyn Reasoner>) -> Self {
        Self { reasoner }
    }

    /// Ask the model for the next step and store it in `state.next_step`.
    pub async fn decide(&self, state: &mut AgentState) {
        let prompt = build_prompt(&state.goal, &state.last_html, &state.step_history);

        let mut next_step = match self.ask(&prompt).await {
            Ok(step) => step,
            Err(e) => {
                warn!(error = %format!("{:#}", e), "JSON parsing error");
                NextStep::fallback()
            }
        };

        if guard_repetition(&mut next_step, &state.step_history) {
            warn!(tool = ?next_step.tool, "Detected repeated step. Stopping loop");
        }

        let args = Value::Object(next_step.args.clone());
        info!(
            tool = ?next_step.tool,
            args = %args,
            done = next_step.done,
            reason = %next_step.reason,
            "Next step decided"
        );

        let trace =
            serde_json::to_string(&next_step).unwrap_or_else(|_| format!("{:?}", next_step));
        state.messages.push(ChatMessage {
            role: "assistant".to_string(),
            content: trace,
        });
        state.next_step = next_step;
    }

    async fn ask(&self, prompt: &str) -> Result<NextStep> {
        let raw = self.reasoner.complete(prompt).await?;
        debug!(raw = %raw, "LLM next step raw");
        parse_next_step(&raw)
    }
}

pub fn build_prompt(goal: &str, last_html: &str, history: &[StepRecord]) -> String {
    let html: String = last_html.chars().take(HTML_PROMPT_MAX_CHARS).collect();
    let history = serde_json::to_string_pretty(history).unwrap_or_else(|_| "[]".to_string());

    format!(
        r##"You are an expert QA automation agent using Playwright MCP tools.
Your task: "{goal}"

You can use:
- browser_navigate → {{"url": "https://..."}}
- browser_wait_for → {{"time": 3000}}
- browser_click → {{"element": "CSS selector"}}
- browser_fill_form → {{"fields": [{{"selector": "CSS selector", "value": "text"}}]}}
- browser_extract_html → {{}}

Rules:
1. Do not repeat the same navigation step twice in a row.
2. Use valid CSS selectors (#user-name, #password, #login-button).
3. If the goal state is visible on the page, mark "done": true and explain.
4. Return only one single step at a time as a valid JSON object.
   Never return arrays, lists, or a "steps" field.
5. Always include a "reason" field explaining the action.
6. Return valid JSON (no markdown formatting).

Example output:
{{
  "tool": "browser_fill_form",
  "args": {{
    "fields": [
      {{"selector": "#user-name", "value": "standard_user"}},
      {{"selector": "#password", "value": "secret_sauce"}}
    ]
  }},
  "reason": "Filling the login fields.",
  "done": false
}}

Current HTML snapshot (truncated): {html}
Previous steps: {history}
"##
    )
}

/// Drop markdown code fences the model might add, wherever they appear.
pub fn strip_code_fences(raw: &str) -> String {
    raw.trim()
        .replace("```json", "")
        .replace("```", "")
        .trim()
        .to_string()
}

pub fn parse_next_step(raw: &str) -> Result<NextStep> {
    let cleaned = strip_code_fences(raw);
    serde_json::from_str(&cleaned).context("Failed to parse LLM response")
}

/// Forces completion when the model proposes exactly the last executed step again.
/// Returns true when the guard fired.
pub fn guard_repetition(next_step: &mut NextStep, history: &[StepRecord]) -> bool {
    let Some(last) = history.last() else {
        return false;
    };

    if next_step.tool.as_deref() == Some(last.tool.as_str()) && next_step.args == last.args {
        next_step.done = true;
        next_step.reason = REPEATED_STEP_REASON.to_string();
        return true;
    }
    false
}
