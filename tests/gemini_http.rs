//! Runs the Gemini client against an in-process fake `generateContent` endpoint.

use std::sync::{Arc, Mutex};

use axum::Router;
use axum::extract::{Json, Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use mcp_qa_agent::config::ReasonerConfig;
use mcp_qa_agent::{AgentState, Brain, GeminiReasoner, NextStep, Reasoner};
use serde_json::{Value, json};

#[derive(Debug, Clone)]
struct Seen {
    path: String,
    api_key: Option<String>,
    body: Value,
}

#[derive(Clone, Default)]
struct FakeGemini {
    seen: Arc<Mutex<Vec<Seen>>>,
}

async fn generate(
    State(server): State<FakeGemini>,
    Path(rest): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    server.seen.lock().unwrap().push(Seen {
        path: rest.clone(),
        api_key: headers
            .get("x-goog-api-key")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        body,
    });

    match rest.as_str() {
        "ok-model:generateContent" => Json(json!({
            "candidates": [{
                "content": {"role": "model", "parts": [
                    {"text": "{\"tool\":\"browser_navigate\","},
                    {"text": "\"args\":{\"url\":\"https://example.test\"},\"reason\":\"open\",\"done\":false}"}
                ]}
            }]
        }))
        .into_response(),
        "denied-model:generateContent" => (
            StatusCode::FORBIDDEN,
            Json(json!({"error": {"code": 403, "message": "API key not valid", "status": "PERMISSION_DENIED"}})),
        )
            .into_response(),
        "empty-model:generateContent" => Json(json!({"candidates": []})).into_response(),
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn spawn_server() -> (String, FakeGemini) {
    let server = FakeGemini::default();
    let app = Router::new()
        .route("/v1beta/models/{*rest}", post(generate))
        .with_state(server.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    // Trailing slash on purpose: the client must not double it.
    (format!("http://{}/v1beta/", addr), server)
}

fn reasoner(base_url: &str, model: &str) -> GeminiReasoner {
    GeminiReasoner::new(ReasonerConfig {
        api_key: "test-key".to_string(),
        model: model.to_string(),
        base_url: base_url.to_string(),
        temperature: 0.5,
    })
}

#[tokio::test]
async fn joins_parts_and_sends_expected_request() {
    let (url, server) = spawn_server().await;

    let text = reasoner(&url, "ok-model").complete("find the login form").await.unwrap();

    assert_eq!(
        text,
        r#"{"tool":"browser_navigate","args":{"url":"https://example.test"},"reason":"open","done":false}"#
    );

    let seen = server.seen.lock().unwrap().clone();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].path, "ok-model:generateContent");
    assert_eq!(seen[0].api_key.as_deref(), Some("test-key"));
    assert_eq!(seen[0].body["generationConfig"]["temperature"], json!(0.5));
    assert_eq!(seen[0].body["contents"][0]["role"], "user");
    assert_eq!(
        seen[0].body["contents"][0]["parts"][0]["text"],
        "find the login form"
    );
}

#[tokio::test]
async fn error_status_surfaces_api_message() {
    let (url, _server) = spawn_server().await;

    let err = reasoner(&url, "denied-model")
        .complete("anything")
        .await
        .unwrap_err()
        .to_string();

    assert!(err.contains("403"), "{err}");
    assert!(err.contains("API key not valid"), "{err}");
}

#[tokio::test]
async fn empty_candidates_is_an_error() {
    let (url, _server) = spawn_server().await;

    let err = reasoner(&url, "empty-model")
        .complete("anything")
        .await
        .unwrap_err()
        .to_string();

    assert!(err.contains("No content in LLM response"), "{err}");
}

#[tokio::test]
async fn brain_parses_real_client_output_and_falls_back_on_errors() {
    let (url, _server) = spawn_server().await;

    let brain = Brain::new(Box::new(reasoner(&url, "ok-model")));
    let mut state = AgentState::new("log in");
    brain.decide(&mut state).await;
    assert_eq!(state.next_step.tool_name(), Some("browser_navigate"));
    assert_eq!(state.next_step.args["url"], "https://example.test");

    let brain = Brain::new(Box::new(reasoner(&url, "denied-model")));
    let mut state = AgentState::new("log in");
    brain.decide(&mut state).await;
    assert_eq!(state.next_step, NextStep::fallback());
}
