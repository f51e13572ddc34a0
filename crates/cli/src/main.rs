//! InboxPilot CLI entry point.
//!
//! Commands:
//! - `gateway`  : Start the HTTP API server
//! - `suggest`  : Run one suggestion from an email JSON file
//! - `token`    : Issue a bearer token for local testing
//! - `doctor`   : Diagnose configuration
//! - `providers`: List supported LLM providers

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "inboxpilot",
    about = "InboxPilot — AI email action suggestions",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true, env = "INBOXPILOT_JSON_LOGS")]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP gateway server
    Gateway {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,

        /// Override the bind address
        #[arg(long)]
        host: Option<String>,
    },

    /// Suggest an action for an email described in a JSON file
    Suggest {
        /// Path to a JSON file with subject, body, sender, user_id, workflow_rules
        file: std::path::PathBuf,

        /// Provider to use instead of the configured default
        #[arg(short, long)]
        provider: Option<String>,
    },

    /// Issue a signed bearer token
    Token {
        /// Subject (user id) of the token
        #[arg(short, long)]
        user: String,

        /// Lifetime in hours
        #[arg(long, default_value_t = 24)]
        ttl_hours: i64,
    },

    /// Diagnose configuration
    Doctor,

    /// List supported LLM providers
    Providers,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false);
    if cli.json_logs {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    match cli.command {
        Commands::Gateway { port, host } => commands::gateway::run(port, host).await?,
        Commands::Suggest { file, provider } => commands::suggest::run(file, provider).await?,
        Commands::Token { user, ttl_hours } => commands::token::run(user, ttl_hours).await?,
        Commands::Doctor => commands::doctor::run().await?,
        Commands::Providers => commands::providers::run().await?,
    }

    Ok(())
}
