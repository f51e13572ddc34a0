//! `inboxpilot token`: Issue a bearer token signed with `JWT_SECRET`.

use inboxpilot_config::AppConfig;
use inboxpilot_security::JwtAuthenticator;

pub async fn run(user: String, ttl_hours: i64) -> Result<(), Box<dyn std::error::Error>> {
    if user.trim().is_empty() {
        return Err("user must not be empty".into());
    }
    if ttl_hours <= 0 {
        return Err("ttl-hours must be positive".into());
    }

    let config =
        AppConfig::load_unchecked().map_err(|e| format!("Failed to load config: {e}"))?;
    let secret = config
        .auth
        .jwt_secret
        .filter(|s| !s.trim().is_empty())
        .ok_or("JWT_SECRET is not set")?;

    let ttl = chrono::TimeDelta::try_hours(ttl_hours).ok_or("ttl-hours is too large")?;
    let token = JwtAuthenticator::new(secret)?.issue(&user, ttl)?;
    println!("{token}");

    Ok(())
}
