//! Provider router: picks the adapter for one request.
//!
//! Adapters are built once at startup by [`build_from_config`]. Selection
//! is a read-only lookup, so the router is shared across requests.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use inboxpilot_config::AppConfig;
use inboxpilot_core::{ProviderError, ProviderKind, SuggestionProvider};
use tracing::{info, warn};

use crate::anthropic::AnthropicProvider;
use crate::openai::OpenAiProvider;

/// Why a provider could not be selected for a request.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SelectError {
    #[error("Unknown AI provider '{0}'")]
    UnknownProvider(String),

    #[error("AI provider '{0}' is not configured on this deployment")]
    Unavailable(ProviderKind),
}

/// Routes suggestion requests to the correct adapter.
pub struct ProviderRouter {
    providers: HashMap<ProviderKind, Arc<dyn SuggestionProvider>>,
    default_provider: ProviderKind,
    strict_names: bool,
}

impl ProviderRouter {
    /// Create a new router with a default provider.
    pub fn new(default_provider: ProviderKind) -> Self {
        Self {
            providers: HashMap::new(),
            default_provider,
            strict_names: false,
        }
    }

    /// Reject unknown override names instead of falling back.
    pub fn with_strict_names(mut self, strict: bool) -> Self {
        self.strict_names = strict;
        self
    }

    /// Register a provider under its own kind.
    pub fn register(&mut self, provider: Arc<dyn SuggestionProvider>) {
        self.providers.insert(provider.kind(), provider);
    }

    pub fn default_kind(&self) -> ProviderKind {
        self.default_provider
    }

    /// Get a specific provider by kind.
    pub fn get(&self, kind: ProviderKind) -> Option<Arc<dyn SuggestionProvider>> {
        self.providers.get(&kind).cloned()
    }

    /// Resolve the provider for a request.
    ///
    /// A non-blank override wins over the default. Unknown names fall back
    /// to the function-calling adapter unless strict names are enabled.
    pub fn select(
        &self,
        override_name: Option<&str>,
    ) -> Result<Arc<dyn SuggestionProvider>, SelectError> {
        let kind = match override_name.map(str::trim).filter(|n| !n.is_empty()) {
            None => self.default_provider,
            Some(name) => match ProviderKind::parse(name) {
                Some(kind) => kind,
                None if self.strict_names => {
                    return Err(SelectError::UnknownProvider(name.to_string()));
                }
                None => {
                    warn!(requested = name, "Unknown AI provider, falling back to openai");
                    ProviderKind::OpenAi
                }
            },
        };

        self.get(kind).ok_or(SelectError::Unavailable(kind))
    }

    /// Registered provider kinds, in a stable order.
    pub fn list(&self) -> Vec<ProviderKind> {
        ProviderKind::ALL
            .into_iter()
            .filter(|k| self.providers.contains_key(k))
            .collect()
    }
}

/// Build adapters for every provider that has a credential.
///
/// The default provider must be buildable; the others are optional.
pub fn build_from_config(config: &AppConfig) -> Result<ProviderRouter, ProviderError> {
    let default_kind = config
        .default_provider_kind()
        .map_err(|e| ProviderError::NotConfigured(e.to_string()))?;
    let timeout = Duration::from_secs(config.providers.request_timeout_secs);

    let mut router =
        ProviderRouter::new(default_kind).with_strict_names(config.providers.strict_names);

    for kind in ProviderKind::ALL {
        match build_provider(config, kind, timeout) {
            Ok(provider) => {
                info!(provider = %kind, model = provider.model(), "Provider ready");
                router.register(provider);
            }
            Err(e) if kind == default_kind => return Err(e),
            Err(e) => {
                info!(provider = %kind, reason = %e, "Provider not available");
            }
        }
    }

    Ok(router)
}

fn build_provider(
    config: &AppConfig,
    kind: ProviderKind,
    timeout: Duration,
) -> Result<Arc<dyn SuggestionProvider>, ProviderError> {
    let settings = config.providers.get(kind);
    let api_key = settings.credential().unwrap_or_default();
    let model = config.model_for(kind);

    Ok(match kind {
        ProviderKind::OpenAi => {
            let mut p = OpenAiProvider::new(api_key, model, timeout)?;
            if let Some(url) = &settings.api_url {
                p = p.with_base_url(url);
            }
            Arc::new(p)
        }
        ProviderKind::Anthropic => {
            let mut p = AnthropicProvider::new(api_key, model, timeout)?;
            if let Some(url) = &settings.api_url {
                p = p.with_base_url(url);
            }
            Arc::new(p)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(pairs: &[(&str, &str)]) -> AppConfig {
        let mut config = AppConfig::default();
        let pairs: Vec<(String, String)> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        config
            .apply_env_with(|key| {
                pairs
                    .iter()
                    .find(|(k, _)| k == key)
                    .map(|(_, v)| v.clone())
            })
            .unwrap();
        config
    }

    fn both() -> ProviderRouter {
        build_from_config(&config(&[
            ("OPENAI_API_KEY", "sk-test"),
            ("CLAUDE_API_KEY", "sk-ant"),
        ]))
        .unwrap()
    }

    #[test]
    fn default_is_used_without_override() {
        let router = both();
        assert_eq!(router.select(None).unwrap().kind(), ProviderKind::OpenAi);
        assert_eq!(router.select(Some("   ")).unwrap().kind(), ProviderKind::OpenAi);
    }

    #[test]
    fn override_is_trimmed_and_case_insensitive() {
        let router = both();
        assert_eq!(
            router.select(Some(" Claude ")).unwrap().kind(),
            ProviderKind::Anthropic
        );
        assert_eq!(
            router.select(Some("anthropic")).unwrap().kind(),
            ProviderKind::Anthropic
        );
        assert_eq!(router.select(Some("OPENAI")).unwrap().kind(), ProviderKind::OpenAi);
    }

    #[test]
    fn unknown_name_falls_back_to_openai() {
        let router = build_from_config(&config(&[
            ("AI_PROVIDER", "claude"),
            ("OPENAI_API_KEY", "sk-test"),
            ("CLAUDE_API_KEY", "sk-ant"),
        ]))
        .unwrap();
        assert_eq!(router.select(None).unwrap().kind(), ProviderKind::Anthropic);
        assert_eq!(router.select(Some("gemini")).unwrap().kind(), ProviderKind::OpenAi);
    }

    #[test]
    fn strict_names_reject_unknown() {
        let router = both().with_strict_names(true);
        assert!(matches!(
            router.select(Some("gemini")),
            Err(SelectError::UnknownProvider(name)) if name == "gemini"
        ));
    }

    #[test]
    fn missing_optional_provider_is_unavailable() {
        let router = build_from_config(&config(&[("OPENAI_API_KEY", "sk-test")])).unwrap();
        assert_eq!(router.list(), vec![ProviderKind::OpenAi]);
        assert!(matches!(
            router.select(Some("claude")),
            Err(SelectError::Unavailable(ProviderKind::Anthropic))
        ));
    }

    #[test]
    fn missing_default_provider_fails_to_build() {
        let result = build_from_config(&config(&[
            ("AI_PROVIDER", "claude"),
            ("OPENAI_API_KEY", "sk-test"),
        ]));
        assert!(matches!(result, Err(ProviderError::NotConfigured(_))));
    }

    #[test]
    fn configured_models_are_used() {
        let router = build_from_config(&config(&[
            ("OPENAI_API_KEY", "sk-test"),
            ("OPENAI_MODEL", "gpt-test"),
        ]))
        .unwrap();
        assert_eq!(router.get(ProviderKind::OpenAi).unwrap().model(), "gpt-test");
    }
}
