//! OpenAI function-calling adapter.
//!
//! Sends one chat completion with a single `suggest_action` tool and forces
//! the model to call it. The tool call's `arguments` string is the result.
//! Any OpenAI-compatible endpoint works when `api_url` points at it.

use async_trait::async_trait;
use inboxpilot_core::{ProviderError, ProviderKind, SuggestionPrompt, SuggestionProvider};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::{check_status, decode_body, http_client, send_error};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const TOOL_NAME: &str = "suggest_action";

/// Function-calling provider for the OpenAI chat completions API.
pub struct OpenAiProvider {
    base_url: String,
    api_key: String,
    model: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl OpenAiProvider {
    /// Create a new provider. Fails when `api_key` is blank.
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(ProviderError::NotConfigured(
                "OPENAI_API_KEY missing for openai provider".into(),
            ));
        }

        Ok(Self {
            base_url: DEFAULT_BASE_URL.into(),
            api_key,
            model: model.into(),
            timeout,
            client: http_client(timeout)?,
        })
    }

    /// Use a custom base URL (proxies, compatible servers, tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request_body<'a>(&'a self, prompt: &'a SuggestionPrompt) -> ApiRequest<'a> {
        ApiRequest {
            model: &self.model,
            messages: vec![
                ApiMessage {
                    role: "system",
                    content: &prompt.system,
                },
                ApiMessage {
                    role: "user",
                    content: &prompt.user,
                },
            ],
            tools: vec![ApiToolDefinition {
                r#type: "function",
                function: ApiToolFunction {
                    name: TOOL_NAME,
                    description: "Suggest action and draft reply for incoming email.",
                    parameters: suggestion_schema(),
                },
            }],
            tool_choice: serde_json::json!({
                "type": "function",
                "function": { "name": TOOL_NAME }
            }),
        }
    }

    /// Pull the tool arguments out of a completion and parse them.
    fn parse_tool_call(&self, response: ApiResponse) -> Result<serde_json::Value, ProviderError> {
        let missing = || ProviderError::MissingToolCall {
            provider: self.name().to_string(),
        };

        let choice = response.choices.into_iter().next().ok_or_else(missing)?;
        let call = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .next()
            .ok_or_else(missing)?;

        serde_json::from_str(&call.function.arguments).map_err(|e| ProviderError::MalformedJson {
            provider: self.name().to_string(),
            reason: e.to_string(),
            raw: call.function.arguments,
        })
    }
}

/// JSON schema for the forced tool's parameters.
fn suggestion_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "action": { "type": "string" },
            "confidence": { "type": "number" },
            "send_permission": { "type": "string" },
            "reply_text": { "type": ["string", "null"] },
            "suggested_workflow_id": { "type": ["string", "null"] }
        },
        "required": ["action", "confidence", "send_permission"]
    })
}

#[async_trait]
impl SuggestionProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenAi
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn suggest_action(
        &self,
        prompt: &SuggestionPrompt,
    ) -> Result<serde_json::Value, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);

        debug!(provider = self.name(), model = %self.model, "Sending completion request");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&self.request_body(prompt))
            .send()
            .await
            .map_err(|e| send_error(e, self.timeout))?;

        let response = check_status(self.name(), response).await?;

        let api_response: ApiResponse =
            decode_body(self.name(), response, self.timeout).await?;

        self.parse_tool_call(api_response)
    }
}

// --- OpenAI API types (internal) ---

#[derive(Debug, Serialize)]
struct ApiRequest<'a> {
    model: &'a str,
    messages: Vec<ApiMessage<'a>>,
    tools: Vec<ApiToolDefinition>,
    tool_choice: serde_json::Value,
}

#[derive(Debug, Serialize)]
struct ApiMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ApiToolDefinition {
    r#type: &'static str,
    function: ApiToolFunction,
}

#[derive(Debug, Serialize)]
struct ApiToolFunction {
    name: &'static str,
    description: &'static str,
    parameters: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    choices: Vec<ApiChoice>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ApiResponseMessage {
    #[serde(default)]
    tool_calls: Option<Vec<ApiToolCall>>,
}

#[derive(Debug, Deserialize)]
struct ApiToolCall {
    function: ApiFunction,
}

#[derive(Debug, Deserialize)]
struct ApiFunction {
    arguments: String,
}
