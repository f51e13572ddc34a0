//! The suggestion pipeline.
//!
//! One run takes a validated [`EmailContext`] through
//! `Received → PromptBuilt → ProviderSelected → UpstreamCalled →
//! OutputValidated → Succeeded`. Any stage can fail; nothing is retried and
//! no second provider is tried.

use std::sync::Arc;
use std::time::Duration;

use inboxpilot_config::AppConfig;
use inboxpilot_core::{
    ActionSuggestion, EmailContext, LOG_EXCERPT_CHARS, OutputValidator, PersonaStore,
    ProviderError, SchemaError, StaticPersona, SuggestionPrompt, excerpt,
};
use inboxpilot_providers::{ProviderRouter, SelectError, build_from_config};
use tracing::{debug, error, info};
use uuid::Uuid;

/// Where a run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Received,
    PromptBuilt,
    ProviderSelected,
    UpstreamCalled,
    OutputValidated,
    Succeeded,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::PromptBuilt => "prompt_built",
            Self::ProviderSelected => "provider_selected",
            Self::UpstreamCalled => "upstream_called",
            Self::OutputValidated => "output_validated",
            Self::Succeeded => "succeeded",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Selection(#[from] SelectError),

    #[error("Provider '{provider}' failed: {source}")]
    Provider {
        provider: String,
        #[source]
        source: ProviderError,
    },

    #[error("Provider '{provider}' returned an invalid suggestion: {source}")]
    Schema {
        provider: String,
        #[source]
        source: SchemaError,
    },
}

impl PipelineError {
    /// The last stage reached before the failure.
    pub fn stage(&self) -> Stage {
        match self {
            Self::Selection(_) => Stage::PromptBuilt,
            Self::Provider { .. } => Stage::ProviderSelected,
            Self::Schema { .. } => Stage::UpstreamCalled,
        }
    }
}

/// Turns an email context into a validated suggestion.
pub struct SuggestionPipeline {
    router: ProviderRouter,
    validator: OutputValidator,
    personas: Arc<dyn PersonaStore>,
    upstream_timeout: Duration,
}

impl SuggestionPipeline {
    pub fn new(
        router: ProviderRouter,
        validator: OutputValidator,
        personas: Arc<dyn PersonaStore>,
        upstream_timeout: Duration,
    ) -> Self {
        Self {
            router,
            validator,
            personas,
            upstream_timeout,
        }
    }

    /// Build adapters and the validator from configuration.
    pub fn from_config(config: &AppConfig) -> Result<Self, ProviderError> {
        Ok(Self::new(
            build_from_config(config)?,
            OutputValidator::new(config.validation.strict_enums),
            Arc::new(StaticPersona::default()),
            Duration::from_secs(config.providers.request_timeout_secs),
        ))
    }

    pub fn router(&self) -> &ProviderRouter {
        &self.router
    }

    /// Run one suggestion request.
    pub async fn suggest(
        &self,
        context: &EmailContext,
        provider_override: Option<&str>,
    ) -> Result<ActionSuggestion, PipelineError> {
        let request_id = Uuid::new_v4();
        debug!(%request_id, stage = %Stage::Received, user_id = context.user_id(), "Suggestion requested");

        let prompt = SuggestionPrompt::for_context(self.personas.as_ref(), context);
        debug!(%request_id, stage = %Stage::PromptBuilt, "Prompt rendered");

        let provider = self.router.select(provider_override)?;
        let provider_name = provider.name().to_string();
        debug!(
            %request_id,
            stage = %Stage::ProviderSelected,
            provider = %provider_name,
            model = provider.model(),
            "Provider selected"
        );

        let upstream = tokio::time::timeout(self.upstream_timeout, provider.suggest_action(&prompt));
        let raw = match upstream.await {
            Ok(Ok(raw)) => raw,
            Ok(Err(e)) => return Err(self.provider_failure(request_id, provider_name, e)),
            Err(_) => {
                let e = ProviderError::Timeout(self.upstream_timeout);
                return Err(self.provider_failure(request_id, provider_name, e));
            }
        };
        debug!(%request_id, stage = %Stage::UpstreamCalled, provider = %provider_name, "Upstream answered");

        let suggestion = match self.validator.validate(&raw) {
            Ok(s) => s,
            Err(e) => {
                error!(
                    %request_id,
                    provider = %provider_name,
                    error = %e,
                    raw = %excerpt(&raw.to_string(), LOG_EXCERPT_CHARS),
                    "Provider output failed validation"
                );
                return Err(PipelineError::Schema {
                    provider: provider_name,
                    source: e,
                });
            }
        };
        debug!(%request_id, stage = %Stage::OutputValidated, "Output validated");

        info!(
            %request_id,
            stage = %Stage::Succeeded,
            provider = %provider_name,
            action = suggestion.action.as_str(),
            confidence = suggestion.confidence,
            "Suggestion produced"
        );
        Ok(suggestion)
    }

    fn provider_failure(
        &self,
        request_id: Uuid,
        provider: String,
        source: ProviderError,
    ) -> PipelineError {
        let raw = source
            .raw_response()
            .map(|r| excerpt(r, LOG_EXCERPT_CHARS))
            .unwrap_or_default();
        error!(
            %request_id,
            provider = %provider,
            contract_violation = source.is_contract_violation(),
            error = %source,
            raw = %raw,
            "Provider call failed"
        );
        PipelineError::Provider { provider, source }
    }
}
