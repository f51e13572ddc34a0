//! `inboxpilot providers`: List supported LLM providers.

use inboxpilot_config::{AppConfig, credential_env, default_model};
use inboxpilot_core::ProviderKind;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load_unchecked().ok();

    println!("🤖 Supported LLM Providers");
    println!("==========================");
    println!();
    for kind in ProviderKind::ALL {
        let configured = config
            .as_ref()
            .is_some_and(|c| c.providers.get(kind).credential().is_some());
        let model = config
            .as_ref()
            .map(|c| c.model_for(kind).to_string())
            .unwrap_or_else(|| default_model(kind).to_string());
        println!(
            "  {:<8} {:<18} model {:<20} {}",
            kind.as_str(),
            strategy(kind),
            model,
            if configured { "configured" } else { "not configured" }
        );
        println!("           key: {}", credential_env(kind));
    }
    println!();
    println!("  Select per request with the X-AI-Provider header (openai | claude).");
    println!("  Environment variables:");
    println!("    AI_PROVIDER, OPENAI_API_KEY, OPENAI_API_BASE, OPENAI_MODEL");
    println!("    CLAUDE_API_KEY, CLAUDE_API_BASE, CLAUDE_MODEL");

    Ok(())
}

fn strategy(kind: ProviderKind) -> &'static str {
    match kind {
        ProviderKind::OpenAi => "function calling",
        ProviderKind::Anthropic => "free text + JSON",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_kind_has_a_strategy() {
        for kind in ProviderKind::ALL {
            assert!(!strategy(kind).is_empty());
        }
    }
}
