//! `inboxpilot doctor`: Diagnose configuration.

use inboxpilot_config::{AppConfig, credential_env};
use inboxpilot_core::ProviderKind;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    println!("🩺 InboxPilot Doctor — Configuration Diagnostics");
    println!("================================================\n");

    let mut issues = 0;

    let config_path = AppConfig::config_path();
    if config_path.exists() {
        println!("  ✅ Config file found at {}", config_path.display());
    } else {
        println!(
            "  ℹ️  No config file at {} — using defaults and environment",
            config_path.display()
        );
    }

    let config = match AppConfig::load_unchecked() {
        Ok(config) => config,
        Err(e) => {
            println!("  ❌ Config invalid: {e}");
            return Ok(());
        }
    };

    match config.default_provider_kind() {
        Ok(kind) => println!("  ✅ Default provider: {kind}"),
        Err(e) => {
            println!("  ❌ {e}");
            issues += 1;
        }
    }

    for kind in ProviderKind::ALL {
        let settings = config.providers.get(kind);
        if settings.credential().is_some() {
            println!("  ✅ {kind}: {} set (model {})", credential_env(kind), config.model_for(kind));
        } else {
            println!("  ⚠️  {kind}: {} not set — provider unavailable", credential_env(kind));
        }
    }

    if config.auth.jwt_secret.as_deref().is_some_and(|s| !s.trim().is_empty()) {
        println!("  ✅ JWT secret configured");
    } else {
        println!("  ❌ JWT_SECRET not set — bearer tokens cannot be verified");
        issues += 1;
    }

    if let Err(e) = config.validate() {
        println!("  ❌ {e}");
        issues += 1;
    }

    // Summary
    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
