// Parley conversation engine
// Main entry point for the Parley binary

use clap::Parser;
use parley_engine::cli::{Cli, Command};
use parley_engine::config::Config;
use parley_engine::handlers::{fatal_diagnostic, handle_feed, handle_interactive, handle_message};
use parley_engine::telemetry::{init_telemetry, init_telemetry_with_level};

#[tokio::main]
async fn main() {
    // Parse CLI arguments
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("{:#}", e);
        for line in fatal_diagnostic(&e) {
            eprintln!("{}", line);
        }
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let debug_http = match &cli.command {
        Command::Interactive { debug, .. }
        | Command::Feed { debug, .. }
        | Command::Message { debug, .. } => *debug,
    };

    // Load configuration (or use custom path if provided)
    let config = match &cli.config {
        Some(config_path) => Config::load_or_create_at(config_path),
        None => Config::load_or_create(),
    };

    // Log level: --log > config > info (RUST_LOG still wins inside telemetry)
    match &config {
        Ok(config) => init_telemetry_with_level(
            cli.log.as_deref().unwrap_or(&config.core.log_level),
            debug_http,
        ),
        Err(_) => init_telemetry(),
    }
    let config = config?;

    let version = env!("CARGO_PKG_VERSION");
    let commit = env!("GIT_COMMIT_HASH");
    let timestamp = env!("BUILD_TIMESTAMP");

    tracing::info!("Parley v{} ({} - {})", version, commit, timestamp);

    // Handle commands
    match cli.command {
        Command::Interactive { token, debug } => handle_interactive(token, debug, &config).await,

        Command::Feed {
            credentials,
            processed_to,
            debug,
        } => handle_feed(&credentials, processed_to, debug, &config).await,

        Command::Message { token, text, debug } => {
            handle_message(token, &text, debug, &config).await
        }
    }
}
