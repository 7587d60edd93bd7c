//! Read-only commands: status, show, history, list and watch

use std::time::Duration;

use anyhow::{Result, bail};
use colored::*;
use reel_client::ReelClient;
use reel_core::domain::job::JobStatus;
use reel_core::dto::job::{JobDetails, JobProgress, JobSummary};
use uuid::Uuid;

use crate::config::Config;
use crate::id_resolver::{for_job, resolve_job_id};

const BAR_WIDTH: usize = 30;

pub async fn status(client: &ReelClient, config: &Config, id: &str) -> Result<()> {
    let job_id = resolve_job_id(client, config, id).await?;
    let progress = client.get_progress(job_id).await.map_err(for_job(job_id))?;

    print_progress(&progress);
    Ok(())
}

pub async fn show(client: &ReelClient, config: &Config, id: &str, json: bool) -> Result<()> {
    let job_id = resolve_job_id(client, config, id).await?;
    let details = client.get_job(job_id).await.map_err(for_job(job_id))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&details)?);
    } else {
        print_job_details(&details);
    }
    Ok(())
}

pub async fn history(client: &ReelClient, config: &Config, id: &str) -> Result<()> {
    let job_id = resolve_job_id(client, config, id).await?;
    let chain = client.history(job_id).await.map_err(for_job(job_id))?;

    println!("{}", format!("Version history ({}):", chain.len()).bold());
    for entry in chain {
        let marker = if entry.id == job_id {
            "▸".cyan()
        } else {
            " ".normal()
        };
        println!(
            "{} v{:<3} {}  {}  {}",
            marker,
            entry.version,
            entry.id.to_string().dimmed(),
            colorize_status(entry.status),
            entry.created_at.format("%Y-%m-%d %H:%M:%S")
        );
        if let Some(feedback) = &entry.iteration_prompt {
            println!("         {}", format!("\"{}\"", feedback).italic());
        }
    }
    Ok(())
}

pub async fn list(client: &ReelClient, config: &Config, limit: Option<u32>) -> Result<()> {
    let jobs = client.list_jobs(config.creator()?, limit).await?;

    if jobs.is_empty() {
        println!("{}", "No jobs found.".yellow());
    } else {
        println!("{}", format!("Found {} job(s):", jobs.len()).bold());
        println!();
        for job in jobs {
            print_job_summary(&job);
        }
    }
    Ok(())
}

/// Polls progress until the job reaches a terminal state
///
/// Fails when the job ends in anything but `completed`.
pub async fn watch(client: &ReelClient, job_id: Uuid, interval: u64) -> Result<()> {
    let interval = Duration::from_secs(interval.max(1));
    let mut last: Option<(JobStatus, u8)> = None;

    loop {
        let progress = client.get_progress(job_id).await.map_err(for_job(job_id))?;
        if last != Some((progress.status, progress.progress)) {
            println!(
                "{} {:>3}% {}",
                progress_bar(progress.progress),
                progress.progress,
                colorize_status(progress.status)
            );
            last = Some((progress.status, progress.progress));
        }

        if progress.status.is_terminal() {
            println!();
            print_progress(&progress);
            return match progress.status {
                JobStatus::Completed => Ok(()),
                status => bail!("Job {} ended {}", job_id, status),
            };
        }
        tokio::time::sleep(interval).await;
    }
}

fn print_progress(progress: &JobProgress) {
    println!("{}", "Job Status:".bold());
    println!("  ID:        {}", progress.job_id.to_string().cyan());
    println!("  Status:    {}", colorize_status(progress.status));
    println!(
        "  Progress:  {} {}%",
        progress_bar(progress.progress),
        progress.progress
    );
    if let Some(error) = &progress.error {
        println!("  Error:     {}", error.red());
    }
    if let Some(url) = &progress.video_url {
        println!("  Video:     {}", url.underline());
    }
    if let Some(url) = &progress.thumbnail_url {
        println!("  Thumbnail: {}", url.dimmed());
    }
}

fn print_job_summary(job: &JobSummary) {
    println!(
        "  {} {} v{}",
        "▸".cyan(),
        job.id.to_string().dimmed(),
        job.version
    );
    println!(
        "    Status:   {} ({}%)",
        colorize_status(job.status),
        job.progress
    );
    println!("    Prompt:   {}", first_line(&job.prompt));
    println!(
        "    Created:  {}",
        job.created_at
            .format("%Y-%m-%d %H:%M:%S")
            .to_string()
            .dimmed()
    );
    println!();
}

fn print_job_details(details: &JobDetails) {
    let job = &details.job;

    println!("{}", "Job Details:".bold());
    println!("  ID:          {}", job.id.to_string().cyan());
    println!("  Status:      {}", colorize_status(job.status));
    println!("  Progress:    {}%", job.progress);
    println!("  Version:     {}", job.version);
    if let Some(parent) = job.parent_job_id {
        println!("  Parent:      {}", parent.to_string().dimmed());
    }
    println!(
        "  Format:      {}s, {}, {}",
        job.target_duration_seconds, job.aspect_ratio, job.style
    );
    println!(
        "  Requested:   {}",
        job.created_at.format("%Y-%m-%d %H:%M:%S")
    );
    if let Some(completed) = job.completed_at {
        println!("  Finished:    {}", completed.format("%Y-%m-%d %H:%M:%S"));
        if let Some(started) = job.started_at {
            let seconds = completed.signed_duration_since(started).num_seconds();
            println!("  Duration:    {}s", seconds);
        }
    }
    if let Some(mode) = job.render_mode {
        let seconds = job.render_duration_seconds.unwrap_or_default();
        println!("  Render:      {} ({:.1}s)", mode, seconds);
    }
    if job.retry_count > 0 {
        println!("  Retries:     {}", job.retry_count);
    }

    println!("\n{}", "Prompt:".bold());
    println!("{}", job.prompt);

    if let Some(error) = &job.error {
        println!("\n{}", "Error:".bold());
        println!("{}", error.red());
    }

    println!("\n{}", "Artifacts:".bold());
    for (i, url) in details.image_urls.iter().enumerate() {
        println!("  Image {:<5} {}", i + 1, url.dimmed());
    }
    if let Some(url) = &details.audio_url {
        println!("  Audio       {}", url.dimmed());
    }
    if let Some(url) = &details.thumbnail_url {
        println!("  Thumbnail   {}", url.dimmed());
    }
    if let Some(url) = &details.video_url {
        println!("  Video       {}", url.underline());
    }
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or_default()
}

fn progress_bar(progress: u8) -> String {
    let filled = usize::from(progress.min(100)) * BAR_WIDTH / 100;
    format!("[{}{}]", "█".repeat(filled), "░".repeat(BAR_WIDTH - filled))
}

/// Colorize job status for display
pub fn colorize_status(status: JobStatus) -> ColoredString {
    let label = status.as_str();
    match status {
        JobStatus::Queued => label.yellow(),
        JobStatus::Scripting
        | JobStatus::Imaging
        | JobStatus::Narrating
        | JobStatus::GeneratingCode
        | JobStatus::Rendering => label.cyan(),
        JobStatus::Completed => label.green(),
        JobStatus::Failed => label.red(),
        JobStatus::Cancelled => label.dimmed(),
    }
}
