//! Legions CLI - Command-line interface
//!
//! Commands:
//! - play: Play bot-vs-bot games locally
//! - serve: Host games over HTTP

mod play;
mod server;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "legions")]
#[command(about = "Legions hex strategy game: bots and game server")]
struct Cli {
    /// Log filter used when RUST_LOG is unset (e.g. "info", "legions_bot=debug")
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play bot-vs-bot games
    Play(play::PlayArgs),
    /// Start the game server
    Serve(server::ServerArgs),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    match cli.command {
        Commands::Play(args) => play::run(args),
        Commands::Serve(args) => server::run(args),
    }
}
