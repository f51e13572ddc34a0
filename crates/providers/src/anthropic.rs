//! Anthropic Messages API adapter.
//!
//! Free-text provider: the model is asked for JSON only, and the object is
//! cut out of whatever text comes back.
//!
//! - `x-api-key` header authentication (not Bearer)
//! - `anthropic-version` header
//! - System prompt as top-level field

use async_trait::async_trait;
use inboxpilot_core::{ProviderError, ProviderKind, SuggestionPrompt, SuggestionProvider};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::{check_status, decode_body, http_client, send_error};

const ANTHROPIC_VERSION: &str = "2023-06-01";
pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const MAX_TOKENS: u32 = 800;
const JSON_ONLY_SUFFIX: &str = "Return ONLY valid JSON.";

/// Anthropic native Messages API provider.
pub struct AnthropicProvider {
    base_url: String,
    api_key: String,
    model: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl AnthropicProvider {
    /// Create a new provider. Fails when `api_key` is blank.
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(ProviderError::NotConfigured(
                "CLAUDE_API_KEY missing for claude provider".into(),
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

    /// Create with a custom base URL (e.g., for testing or proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request_body<'a>(&'a self, prompt: &'a SuggestionPrompt) -> AnthropicRequest<'a> {
        AnthropicRequest {
            model: &self.model,
            max_tokens: MAX_TOKENS,
            system: &prompt.system,
            messages: vec![AnthropicMessage {
                role: "user",
                content: format!("{}{JSON_ONLY_SUFFIX}", prompt.user),
            }],
        }
    }

    /// Join the text blocks of a reply and parse the JSON object inside.
    fn parse_text(&self, response: AnthropicResponse) -> Result<serde_json::Value, ProviderError> {
        let raw = response
            .content
            .into_iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text),
                ContentBlock::Other => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
            .trim()
            .to_string();

        let Some(candidate) = extract_json_object(&raw) else {
            return Err(ProviderError::MissingJson {
                provider: self.name().to_string(),
                raw: raw.clone(),
            });
        };

        serde_json::from_str(candidate).map_err(|e| ProviderError::MalformedJson {
            provider: self.name().to_string(),
            reason: e.to_string(),
            raw: raw.clone(),
        })
    }
}

/// The span from the first `{` to the last `}`, inclusive.
///
/// Returns `None` when either delimiter is absent or the last `}` comes
/// before the first `{`.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

#[async_trait]
impl SuggestionProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "claude"
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Anthropic
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn suggest_action(
        &self,
        prompt: &SuggestionPrompt,
    ) -> Result<serde_json::Value, ProviderError> {
        let url = format!("{}/v1/messages", self.base_url);

        debug!(provider = self.name(), model = %self.model, "Sending messages request");

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&self.request_body(prompt))
            .send()
            .await
            .map_err(|e| send_error(e, self.timeout))?;

        let response = check_status(self.name(), response).await?;

        let api_response: AnthropicResponse =
            decode_body(self.name(), response, self.timeout).await?;

        self.parse_text(api_response)
    }
}

// --- Anthropic API types (internal) ---

#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<AnthropicMessage>,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text {
        text: String,
    },
    #[serde(other)]
    Other,
}
