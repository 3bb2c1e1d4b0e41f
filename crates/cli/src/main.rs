//! Legal RAG CLI
//!
//! This binary provides the command-line interface for the legalrag service.

#![deny(warnings)]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use legalrag_core::config::Config;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "legalrag")]
#[command(about = "Legal document retrieval service backed by a vector database")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Configuration file path
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Commands {
    /// Start the HTTP service (default)
    Serve,
    /// Connect, ensure the collection exists, then exit
    Bootstrap,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load .env before logging so RUST_LOG from the file applies
    let dotenv = dotenvy::dotenv();

    init_logging(cli.verbose)?;

    match dotenv {
        Ok(path) => info!("Loaded environment from {}", path.display()),
        Err(e) if e.not_found() => {}
        Err(e) => warn!("Ignoring unreadable .env file: {e}"),
    }

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(cli.config.as_deref()).await,
        Commands::Bootstrap => bootstrap(cli.config.as_deref()).await,
    }
}

/// Initialize logging system
fn init_logging(verbose: bool) -> Result<()> {
    let level = if verbose { "debug" } else { "info" };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("legalrag={level},tower_http={level}")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {e}"))?;

    Ok(())
}

fn load_config(config_path: Option<&Path>) -> Result<Config> {
    let config = Config::load(config_path).context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

async fn serve(config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path)?;
    info!(
        host = %config.server.host,
        port = config.server.port,
        "Starting Legal RAG API"
    );

    if let Err(e) = legalrag_server::run_server(config).await {
        error!(kind = %e.kind(), "Service stopped with error: {e}");
        return Err(e.into());
    }

    info!("Legal RAG API shut down successfully");
    Ok(())
}

async fn bootstrap(config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path)?;

    match legalrag_server::run_bootstrap(config).await {
        Ok(outcome) => {
            info!(%outcome, "Schema bootstrap complete");
            Ok(())
        }
        Err(e) => {
            error!(kind = %e.kind(), "Schema bootstrap failed: {e}");
            Err(e.into())
        }
    }
}
