//! End-to-end integration tests for the InboxPilot gateway.
//!
//! These tests build the full router from configuration and exercise it
//! against mock upstream model APIs, from the HTTP request down to the
//! provider wire format and back.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use inboxpilot_config::AppConfig;
use inboxpilot_gateway::{GatewayState, build_router};
use inboxpilot_security::JwtAuthenticator;
use serde_json::{Value, json};
use tower::ServiceExt;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SECRET: &str = "dev-secret-key-change-in-production";

// ── Harness ──────────────────────────────────────────────────────────────

struct Upstreams {
    openai: MockServer,
    claude: MockServer,
}

impl Upstreams {
    async fn start() -> Self {
        Self {
            openai: MockServer::start().await,
            claude: MockServer::start().await,
        }
    }

    fn config(&self, extra: &[(&str, &str)]) -> AppConfig {
        let mut vars: HashMap<String, String> = [
            ("OPENAI_API_KEY", "sk-test"),
            ("CLAUDE_API_KEY", "sk-ant-test"),
            ("JWT_SECRET", SECRET),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        vars.insert("OPENAI_API_BASE".into(), self.openai.uri());
        vars.insert("CLAUDE_API_BASE".into(), self.claude.uri());
        for (k, v) in extra {
            vars.insert(k.to_string(), v.to_string());
        }

        let mut config = AppConfig::default();
        config.apply_env_with(|key| vars.get(key).cloned()).unwrap();
        config.validate().unwrap();
        config
    }
}

fn state(config: &AppConfig) -> Arc<GatewayState> {
    Arc::new(GatewayState::from_config(config).unwrap())
}

fn token(user: &str) -> String {
    JwtAuthenticator::new(SECRET)
        .unwrap()
        .issue(user, chrono::Duration::hours(1))
        .unwrap()
}

fn email() -> Value {
    json!({
        "subject": "Follow up on Q3 report",
        "body": "Can you send the Q3 report?",
        "sender": "boss@company.com",
        "thread_history": "Earlier: please send by Friday",
        "user_id": "test_user",
        "workflow_rules": "If from CEO, auto-send replies"
    })
}

fn suggest_request(provider: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/api/v1/ai/suggest-action")
        .header("content-type", "application/json")
        .header("authorization", format!("Bearer {}", token("test_user")));
    if let Some(p) = provider {
        builder = builder.header("X-AI-Provider", p);
    }
    let mut req = builder.body(Body::from(email().to_string())).unwrap();
    req.extensions_mut()
        .insert(ConnectInfo(SocketAddr::from(([192, 168, 1, 20], 51000))));
    req
}

async fn call(state: &Arc<GatewayState>, req: Request<Body>) -> (StatusCode, Value) {
    let response = build_router(state.clone()).oneshot(req).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

fn openai_tool_call(arguments: &Value) -> Value {
    json!({
        "id": "chatcmpl-e2e",
        "object": "chat.completion",
        "model": "gpt-4o-mini",
        "choices": [{
            "index": 0,
            "message": {
                "role": "assistant",
                "content": null,
                "tool_calls": [{
                    "id": "call_e2e",
                    "type": "function",
                    "function": {
                        "name": "suggest_action",
                        "arguments": arguments.to_string()
                    }
                }]
            },
            "finish_reason": "tool_calls"
        }]
    })
}

fn claude_text(text: &str) -> Value {
    json!({
        "id": "msg_e2e",
        "type": "message",
        "role": "assistant",
        "model": "claude-sonnet-4.5",
        "content": [{ "type": "text", "text": text }],
        "stop_reason": "end_turn"
    })
}

// ── Tests ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_openai_function_calling() {
    let upstreams = Upstreams::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(openai_tool_call(&json!({
            "action": "draft_reply",
            "confidence": 0.9,
            "send_permission": "draft_only",
            "reply_text": "Test reply",
            "suggested_workflow_id": null
        }))))
        .expect(1)
        .mount(&upstreams.openai)
        .await;

    let state = state(&upstreams.config(&[]));
    let (status, json) = call(&state, suggest_request(None)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        json,
        json!({
            "action": "draft_reply",
            "confidence": 0.9,
            "send_permission": "draft_only",
            "reply_text": "Test reply",
            "suggested_workflow_id": null
        })
    );

    // The upstream saw the rendered prompt and the forced tool.
    let requests = upstreams.openai.received_requests().await.unwrap();
    let sent: Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(sent["model"], "gpt-4o-mini");
    assert_eq!(sent["tool_choice"]["function"]["name"], "suggest_action");
    let system = sent["messages"][0]["content"].as_str().unwrap();
    assert!(system.contains("If from CEO, auto-send replies"));
    let user = sent["messages"][1]["content"].as_str().unwrap();
    assert!(user.contains("Thread History:\nEarlier: please send by Friday"));
}

#[tokio::test]
async fn e2e_claude_override_extracts_json_from_prose() {
    let upstreams = Upstreams::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .and(header("x-api-key", "sk-ant-test"))
        .and(header("anthropic-version", "2023-06-01"))
        .respond_with(ResponseTemplate::new(200).set_body_json(claude_text(
            "Here is my analysis:\n{\"action\": \"archive\", \"confidence\": 0.55, \
             \"send_permission\": \"needs_review\", \"reply_text\": null}\nDone.",
        )))
        .expect(1)
        .mount(&upstreams.claude)
        .await;

    let state = state(&upstreams.config(&[]));
    let (status, json) = call(&state, suggest_request(Some(" Claude "))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["action"], "archive");
    assert_eq!(json["confidence"], 0.55);
    assert_eq!(json["send_permission"], "needs_review");
    assert!(json["reply_text"].is_null());
    assert!(upstreams.openai.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn e2e_claude_as_default_provider() {
    let upstreams = Upstreams::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(claude_text(
            r#"{"action":"flag_for_review","confidence":0.4,"send_permission":"needs_review"}"#,
        )))
        .mount(&upstreams.claude)
        .await;

    let state = state(&upstreams.config(&[("AI_PROVIDER", "claude")]));
    let (status, json) = call(&state, suggest_request(None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["action"], "flag_for_review");
}

#[tokio::test]
async fn e2e_prose_without_json_is_generic_500() {
    let upstreams = Upstreams::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(claude_text("I would archive this, it looks like spam.")),
        )
        .mount(&upstreams.claude)
        .await;

    let state = state(&upstreams.config(&[]));
    let (status, json) = call(&state, suggest_request(Some("claude"))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(!json["error"].as_str().unwrap().contains("spam"));
}

#[tokio::test]
async fn e2e_tool_call_missing_is_generic_500() {
    let upstreams = Upstreams::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{
                "index": 0,
                "message": { "role": "assistant", "content": "archive it" },
                "finish_reason": "stop"
            }]
        })))
        .mount(&upstreams.openai)
        .await;

    let state = state(&upstreams.config(&[]));
    let (status, _) = call(&state, suggest_request(None)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn e2e_unknown_enum_respects_validation_mode() {
    let upstreams = Upstreams::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(openai_tool_call(&json!({
            "action": "snooze",
            "confidence": 0.5,
            "send_permission": "draft_only"
        }))))
        .mount(&upstreams.openai)
        .await;

    let strict = state(&upstreams.config(&[]));
    let (status, _) = call(&strict, suggest_request(None)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    let mut config = upstreams.config(&[]);
    config.validation.strict_enums = false;
    let relaxed = state(&config);
    let (status, json) = call(&relaxed, suggest_request(None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["action"], "snooze");
}

#[tokio::test]
async fn e2e_upstream_error_status_is_generic_500() {
    let upstreams = Upstreams::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .mount(&upstreams.openai)
        .await;

    let state = state(&upstreams.config(&[]));
    let (status, json) = call(&state, suggest_request(None)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(!json["error"].as_str().unwrap().contains("overloaded"));
}

#[tokio::test]
async fn e2e_rate_limit_from_config() {
    let upstreams = Upstreams::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(openai_tool_call(&json!({
            "action": "archive",
            "confidence": 0.8,
            "send_permission": "auto_send"
        }))))
        .mount(&upstreams.openai)
        .await;

    let state = state(&upstreams.config(&[]));
    for _ in 0..5 {
        let (status, _) = call(&state, suggest_request(None)).await;
        assert_eq!(status, StatusCode::OK);
    }
    let (status, _) = call(&state, suggest_request(None)).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(upstreams.openai.received_requests().await.unwrap().len(), 5);
}

#[tokio::test]
async fn e2e_strict_provider_names() {
    let upstreams = Upstreams::start().await;
    let mut config = upstreams.config(&[]);
    config.providers.strict_names = true;

    let state = state(&config);
    let (status, json) = call(&state, suggest_request(Some("gemini"))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("gemini"));
    assert!(upstreams.openai.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn e2e_config_file_and_env_layering() {
    let upstreams = Upstreams::start().await;
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("inboxpilot.toml");
    std::fs::write(
        &path,
        "default_provider = \"claude\"\n\n[rate_limit]\nrequests_per_window = 2\n",
    )
    .unwrap();

    let openai_base = upstreams.openai.uri();
    let claude_base = upstreams.claude.uri();
    let config = AppConfig::load_with(&path, |key| match key {
        "CLAUDE_API_KEY" => Some("sk-ant-test".into()),
        "CLAUDE_API_BASE" => Some(claude_base.clone()),
        "OPENAI_API_BASE" => Some(openai_base.clone()),
        "JWT_SECRET" => Some(SECRET.into()),
        _ => None,
    })
    .unwrap();
    assert_eq!(config.rate_limit.requests_per_window, 2);

    let state = state(&config);
    assert_eq!(state.pipeline.router().list().len(), 1);

    // OpenAI has no key on this deployment.
    let (status, _) = call(&state, suggest_request(Some("openai"))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
