//! `inboxpilot suggest`: Run one suggestion without the HTTP server.

use std::path::PathBuf;

use inboxpilot_config::AppConfig;
use inboxpilot_core::{EmailContext, EmailContextRequest};
use inboxpilot_pipeline::SuggestionPipeline;

pub async fn run(
    file: PathBuf,
    provider: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let text = std::fs::read_to_string(&file)
        .map_err(|e| format!("Failed to read {}: {e}", file.display()))?;
    let context = parse_context(&text)?;

    let config =
        AppConfig::load_unchecked().map_err(|e| format!("Failed to load config: {e}"))?;
    let pipeline = SuggestionPipeline::from_config(&config)?;

    let suggestion = pipeline.suggest(&context, provider.as_deref()).await?;
    println!("{}", serde_json::to_string_pretty(&suggestion)?);

    Ok(())
}

/// Decode and validate an email context document.
fn parse_context(text: &str) -> Result<EmailContext, Box<dyn std::error::Error>> {
    let request: EmailContextRequest = serde_json::from_str(text)?;
    Ok(EmailContext::try_from(request)?)
}
