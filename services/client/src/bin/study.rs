//! services/client/src/bin/study.rs

use clap::Parser;
use client_lib::{
    cli::{run, AppState, Cli},
    config::Config,
    error::ClientError,
};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match start(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Command failed: {:?}", e);
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn start(cli: Cli) -> Result<(), ClientError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
    info!("Configuration loaded. API at {}", config.api_base_url);

    // --- 2. Wire Adapters and Core Services ---
    let state = AppState::build(config)?;

    // --- 3. Run the Command ---
    let result = run(cli.command, &state).await;
    state.collection.close().await;
    result
}
