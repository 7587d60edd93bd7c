//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod query;
mod video;

use anyhow::Result;
use clap::{Args, Subcommand};
use reel_client::ReelClient;

use crate::config::Config;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Queue a new video from a prompt
    Generate(GenerateArgs),
    /// Queue the next version of a video with feedback
    Iterate {
        /// Job ID or unambiguous prefix
        id: String,
        /// What to change
        feedback: String,
        /// Follow progress until the job finishes
        #[arg(short, long)]
        watch: bool,
    },
    /// Show status and progress of a job
    Status {
        /// Job ID or unambiguous prefix
        id: String,
    },
    /// Show every detail of a job, including artifact URLs
    Show {
        /// Job ID or unambiguous prefix
        id: String,
        /// Print the raw JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the version chain a job belongs to
    History {
        /// Job ID or unambiguous prefix
        id: String,
    },
    /// List the creator's jobs, newest first
    List {
        /// Maximum number of jobs
        #[arg(short, long)]
        limit: Option<u32>,
    },
    /// Cancel a queued or running job
    Cancel {
        /// Job ID or unambiguous prefix
        id: String,
    },
    /// Follow a job's progress until it finishes
    Watch {
        /// Job ID or unambiguous prefix
        id: String,
        /// Seconds between polls
        #[arg(short, long, default_value_t = 2)]
        interval: u64,
    },
}

#[derive(Args)]
pub struct GenerateArgs {
    /// What the video should be about
    pub prompt: String,
    #[arg(long)]
    pub style: Option<String>,
    /// Target length in seconds
    #[arg(short, long)]
    pub duration: Option<u32>,
    /// 9:16, 16:9 or 1:1
    #[arg(short, long)]
    pub aspect_ratio: Option<String>,
    #[arg(long)]
    pub voice: Option<String>,
    #[arg(long)]
    pub store: Option<String>,
    #[arg(long)]
    pub course: Option<String>,
    #[arg(long)]
    pub product: Option<String>,
    /// Follow progress until the job finishes
    #[arg(short, long)]
    pub watch: bool,
}

/// Handle a CLI command
pub async fn handle_command(command: Commands, config: &Config) -> Result<()> {
    let client = ReelClient::new(config.api_url.clone());

    match command {
        Commands::Generate(args) => video::generate(&client, config, args).await,
        Commands::Iterate {
            id,
            feedback,
            watch,
        } => video::iterate(&client, config, &id, feedback, watch).await,
        Commands::Cancel { id } => video::cancel(&client, config, &id).await,
        Commands::Status { id } => query::status(&client, config, &id).await,
        Commands::Show { id, json } => query::show(&client, config, &id, json).await,
        Commands::History { id } => query::history(&client, config, &id).await,
        Commands::List { limit } => query::list(&client, config, limit).await,
        Commands::Watch { id, interval } => {
            let id = crate::id_resolver::resolve_job_id(&client, config, &id).await?;
            query::watch(&client, id, interval).await
        }
    }
}
