//! LLM provider adapters for InboxPilot.
//!
//! All adapters implement the `inboxpilot_core::SuggestionProvider` trait.
//! The router picks one per request from the deployment default and an
//! optional caller override.

pub mod anthropic;
pub mod openai;
pub mod router;

pub use anthropic::AnthropicProvider;
pub use openai::OpenAiProvider;
pub use router::{ProviderRouter, SelectError, build_from_config};

use inboxpilot_core::ProviderError;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::warn;

/// Build the shared HTTP client for one adapter.
pub(crate) fn http_client(timeout: Duration) -> Result<reqwest::Client, ProviderError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| ProviderError::Network(format!("Failed to create HTTP client: {e}")))
}

/// Map a transport failure. reqwest reports its own timeout separately.
pub(crate) fn send_error(err: reqwest::Error, timeout: Duration) -> ProviderError {
    if err.is_timeout() {
        ProviderError::Timeout(timeout)
    } else {
        ProviderError::Network(err.to_string())
    }
}

/// Turn upstream error statuses into `ProviderError`s.
pub(crate) async fn check_status(
    provider: &str,
    response: reqwest::Response,
) -> Result<reqwest::Response, ProviderError> {
    let status = response.status().as_u16();

    if status == 429 {
        return Err(ProviderError::RateLimited {
            retry_after_secs: 5,
        });
    }

    if status == 401 || status == 403 {
        return Err(ProviderError::AuthenticationFailed(
            "Invalid API key or insufficient permissions".into(),
        ));
    }

    if !response.status().is_success() {
        let error_body = response.text().await.unwrap_or_default();
        warn!(
            provider,
            status,
            body = %inboxpilot_core::excerpt(&error_body, inboxpilot_core::LOG_EXCERPT_CHARS),
            "Provider returned error"
        );
        return Err(ProviderError::ApiError {
            status_code: status,
            message: error_body,
        });
    }

    Ok(response)
}

/// Read a 2xx body and decode it. A body that does not match the upstream's
/// documented shape is a contract violation, not an HTTP error.
pub(crate) async fn decode_body<T: DeserializeOwned>(
    provider: &str,
    response: reqwest::Response,
    timeout: Duration,
) -> Result<T, ProviderError> {
    let body = response.text().await.map_err(|e| send_error(e, timeout))?;
    serde_json::from_str(&body).map_err(|e| ProviderError::InvalidResponse {
        provider: provider.to_string(),
        reason: e.to_string(),
        raw: body,
    })
}
