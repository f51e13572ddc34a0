//! Provider trait, the abstraction over LLM backends.
//!
//! A provider knows how to turn a rendered [`SuggestionPrompt`] into raw,
//! not-yet-validated JSON. How it gets there (forced tool call, free text
//! plus extraction) is the provider's business.
//!
//! Implementations: OpenAI-style function calling, Anthropic-style free text.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::prompt::SuggestionPrompt;

/// The closed set of supported model families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Native structured tool invocation.
    OpenAi,
    /// Free text with JSON extraction.
    Anthropic,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 2] = [ProviderKind::OpenAi, ProviderKind::Anthropic];

    /// Parse a provider name. Trims and ignores case.
    /// `claude` and `anthropic` both name the free-text family.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "openai" => Some(Self::OpenAi),
            "claude" | "anthropic" => Some(Self::Anthropic),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Anthropic => "claude",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The core provider trait.
///
/// Implementations hold only static configuration, so one instance is
/// shared by all concurrent requests.
#[async_trait]
pub trait SuggestionProvider: Send + Sync {
    /// A human-readable name for this provider (e.g., "openai", "claude").
    fn name(&self) -> &str;

    fn kind(&self) -> ProviderKind;

    /// The model identifier sent upstream.
    fn model(&self) -> &str;

    /// Ask the upstream model for a suggestion and return its raw JSON.
    async fn suggest_action(
        &self,
        prompt: &SuggestionPrompt,
    ) -> Result<serde_json::Value, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_ignores_case_and_whitespace() {
        assert_eq!(ProviderKind::parse("claude"), Some(ProviderKind::Anthropic));
        assert_eq!(ProviderKind::parse(" Claude "), Some(ProviderKind::Anthropic));
        assert_eq!(ProviderKind::parse("ANTHROPIC"), Some(ProviderKind::Anthropic));
        assert_eq!(ProviderKind::parse("OpenAI"), Some(ProviderKind::OpenAi));
        assert_eq!(ProviderKind::parse("gemini"), None);
        assert_eq!(ProviderKind::parse(""), None);
    }

    #[test]
    fn display_uses_wire_name() {
        assert_eq!(ProviderKind::OpenAi.to_string(), "openai");
        assert_eq!(ProviderKind::Anthropic.to_string(), "claude");
    }

    struct Fixed;

    #[async_trait]
    impl SuggestionProvider for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        fn kind(&self) -> ProviderKind {
            ProviderKind::OpenAi
        }

        fn model(&self) -> &str {
            "fixed-model"
        }

        async fn suggest_action(
            &self,
            _prompt: &SuggestionPrompt,
        ) -> Result<serde_json::Value, ProviderError> {
            Ok(serde_json::json!({"action": "archive"}))
        }
    }

    #[tokio::test]
    async fn trait_objects_are_usable() {
        let provider: Box<dyn SuggestionProvider> = Box::new(Fixed);
        let prompt = SuggestionPrompt {
            system: "s".into(),
            user: "u".into(),
        };
        let raw = provider.suggest_action(&prompt).await.unwrap();
        assert_eq!(raw["action"], "archive");
    }
}
