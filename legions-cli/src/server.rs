//! Serve command - host games over HTTP
//!
//! ## Architecture
//!
//! - run() - orchestration
//! - configure_server(), start_server()

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use legions_server::{run_server, ServerConfig};

// ============================================================================
// COMMAND ARGUMENTS
// ============================================================================

#[derive(Args)]
pub struct ServerArgs {
    /// Port number to listen on
    #[arg(long)]
    pub port: Option<u16>,

    /// Search budget for bot seats, in milliseconds
    #[arg(long)]
    pub bot_time_limit_ms: Option<u64>,

    /// Server configuration JSON file
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

// ============================================================================
// ORCHESTRATION
// ============================================================================

pub fn run(args: ServerArgs) -> Result<()> {
    let config = configure_server(&args)?;

    tracing::info!(
        "Starting Legions server on port {} (bot budget {} ms)",
        config.port,
        config.bot_time_limit_ms
    );

    start_server(config)
}

// ============================================================================
// PHASES
// ============================================================================

/// Configure server from the optional file and command arguments
fn configure_server(args: &ServerArgs) -> Result<ServerConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read server config: {}", path.display()))?;
            serde_json::from_str(&text).with_context(|| format!("Invalid server config: {}", path.display()))?
        }
        None => ServerConfig::default(),
    };
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(ms) = args.bot_time_limit_ms {
        config.bot_time_limit_ms = ms;
    }
    Ok(config)
}

/// Start the server (blocking)
fn start_server(config: ServerConfig) -> Result<()> {
    let runtime = tokio::runtime::Runtime::new().context("Failed to start the tokio runtime")?;

    runtime.block_on(async { run_server(config).await })
}

// ============================================================================
// TESTS
// ============================================================================
