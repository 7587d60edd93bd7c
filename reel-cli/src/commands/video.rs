//! Job creation and cancellation commands

use anyhow::Result;
use colored::*;
use reel_client::ReelClient;
use reel_core::dto::job::{GenerateOptions, GenerateVideo, IterateVideo};

use super::GenerateArgs;
use super::query::{colorize_status, watch};
use crate::config::Config;
use crate::id_resolver::{for_job, resolve_job_id};

/// Seconds between progress polls when `--watch` is given
const WATCH_INTERVAL: u64 = 2;

pub async fn generate(client: &ReelClient, config: &Config, args: GenerateArgs) -> Result<()> {
    let defaults = GenerateOptions::default();
    let options = GenerateOptions {
        course_id: args.course,
        product_id: args.product,
        store_id: args.store,
        style: args.style.unwrap_or(defaults.style),
        target_duration_seconds: args.duration.unwrap_or(defaults.target_duration_seconds),
        aspect_ratio: args.aspect_ratio.unwrap_or(defaults.aspect_ratio),
        voice_id: args.voice,
    };
    let req = GenerateVideo {
        creator_id: config.creator()?.to_string(),
        prompt: args.prompt,
        options,
    };

    let created = client.generate(&req).await?;

    println!("{}", "✓ Video job queued".green().bold());
    println!("  ID:       {}", created.job_id.to_string().cyan());
    println!(
        "  Format:   {}s, {}, {}",
        req.options.target_duration_seconds, req.options.aspect_ratio, req.options.style
    );

    if args.watch {
        println!();
        watch(client, created.job_id, WATCH_INTERVAL).await?;
    }
    Ok(())
}

pub async fn iterate(
    client: &ReelClient,
    config: &Config,
    id: &str,
    feedback: String,
    follow: bool,
) -> Result<()> {
    let parent_id = resolve_job_id(client, config, id).await?;
    let req = IterateVideo {
        creator_id: config.creator()?.to_string(),
        feedback,
    };

    let created = client
        .iterate(parent_id, &req)
        .await
        .map_err(for_job(parent_id))?;

    println!("{}", "✓ Iteration queued".green().bold());
    println!("  ID:       {}", created.job_id.to_string().cyan());
    println!("  Parent:   {}", parent_id.to_string().dimmed());

    if follow {
        println!();
        watch(client, created.job_id, WATCH_INTERVAL).await?;
    }
    Ok(())
}

pub async fn cancel(client: &ReelClient, config: &Config, id: &str) -> Result<()> {
    let job_id = resolve_job_id(client, config, id).await?;
    let accepted = client.cancel(job_id).await.map_err(for_job(job_id))?;

    if accepted.status.is_terminal() {
        println!("{} Job {} cancelled", "✓".green(), job_id.to_string().cyan());
    } else {
        println!(
            "{} Cancellation requested; job {} stops after its current step ({})",
            "✓".green(),
            job_id.to_string().cyan(),
            colorize_status(accepted.status)
        );
    }
    Ok(())
}
