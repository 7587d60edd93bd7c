//! Reel CLI
//!
//! Command-line interface for queueing and following videos on the Reel
//! orchestrator.

mod commands;
mod config;
mod id_resolver;
mod types;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, handle_command};
use config::Config;

#[derive(Parser)]
#[command(name = "reel")]
#[command(about = "Reel video generation CLI", long_about = None)]
struct Cli {
    /// Orchestrator URL
    #[arg(long, env = "REEL_API_URL", default_value = "http://localhost:8080")]
    api_url: String,

    /// Creator the commands act for
    #[arg(long, env = "REEL_CREATOR_ID")]
    creator: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config {
        api_url: cli.api_url,
        creator_id: cli.creator,
    };

    handle_command(cli.command, &config).await
}
