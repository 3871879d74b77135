use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Tool used after every step to refresh the page snapshot.
pub const EXTRACT_HTML_TOOL: &str = "browser_extract_html";

/// How much of the last page snapshot is shown to the model.
pub const HTML_PROMPT_MAX_CHARS: usize = 2000;

pub const MAX_STEPS_PER_TASK: usize = 25;

/// A single action the model asks the agent to perform.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NextStep {
    #[serde(default)]
    pub tool: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub args: Map<String, Value>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub reason: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub done: bool,
}

/// Models often send `null` where they mean "nothing".
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl NextStep {
    /// Terminating step used whenever the model reply is unusable.
    pub fn fallback() -> Self {
        Self {
            tool: None,
            args: Map::new(),
            reason: "Invalid JSON or model error".to_string(),
            done: true,
        }
    }

    /// Tool name, treating an empty string like a missing one.
    pub fn tool_name(&self) -> Option<&str> {
        self.tool.as_deref().filter(|t| !t.is_empty())
    }
}

/// One executed step, as kept in the run's audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub tool: String,
    pub args: Map<String, Value>,
    pub reason: String,
    pub result: Value,
    pub html_length: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunResult {
    #[default]
    InProgress,
    Pass,
    Fail,
}

impl std::fmt::Display for RunResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            RunResult::InProgress => "IN_PROGRESS",
            RunResult::Pass => "PASS",
            RunResult::Fail => "FAIL",
        };
        f.write_str(label)
    }
}

/// A message in the conversation log. Kept for traceability only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

/// Everything threaded through one run of the decide/execute/check loop.
#[derive(Debug, Clone, Serialize)]
pub struct AgentState {
    pub goal: String,
    pub last_html: String,
    pub step_history: Vec<StepRecord>,
    pub done: bool,
    pub next_step: NextStep,
    pub result: RunResult,
    pub messages: Vec<ChatMessage>,
}

impl AgentState {
    pub fn new(goal: impl Into<String>) -> Self {
        Self {
            goal: goal.into(),
            last_html: String::new(),
            step_history: Vec::new(),
            done: false,
            next_step: NextStep::default(),
            result: RunResult::InProgress,
            messages: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_result_uses_screaming_case() {
        assert_eq!(
            serde_json::to_string(&RunResult::InProgress).unwrap(),
            "\"IN_PROGRESS\""
        );
        assert_eq!(RunResult::Fail.to_string(), "FAIL");
    }

    #[test]
    fn next_step_fills_missing_fields() {
        let step: NextStep = serde_json::from_str(r#"{"tool":"browser_navigate"}"#).unwrap();
        assert_eq!(step.tool_name(), Some("browser_navigate"));
        assert!(step.args.is_empty());
        assert!(step.reason.is_empty());
        assert!(!step.done);
    }

    #[test]
    fn null_fields_fall_back_to_defaults() {
        let step: NextStep = serde_json::from_str(
            r#"{"tool":"browser_extract_html","args":null,"reason":null,"done":null}"#,
        )
        .unwrap();
        assert_eq!(step.tool_name(), Some("browser_extract_html"));
        assert!(step.args.is_empty());
        assert!(step.reason.is_empty());
        assert!(!step.done);
    }

    #[test]
    fn empty_tool_name_counts_as_missing() {
        let step = NextStep {
            tool: Some(String::new()),
            ..NextStep::default()
        };
        assert_eq!(step.tool_name(), None);
    }
}
