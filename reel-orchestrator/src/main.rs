//! Reel Orchestrator
//!
//! HTTP service that accepts video generation jobs and runs their pipelines.
//!
//! Architecture:
//! - Configuration: environment variables, read once at startup
//! - Repositories: Postgres when DATABASE_URL is set, in memory otherwise
//! - Scheduler: bounded queue feeding pipeline tasks, plus a periodic sweep
//! - API: axum router over `VideoService`

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use reel_orchestrator::api::{self, AppState};
use reel_orchestrator::artifact;
use reel_orchestrator::config::Config;
use reel_orchestrator::db;
use reel_orchestrator::pipeline::{Pipeline, RetryPolicy};
use reel_orchestrator::render;
use reel_orchestrator::repository::{
    CreatorDirectory, InMemoryJobRepository, JobRepository, PgCreatorDirectory, PgJobRepository,
    StaticCreatorDirectory,
};
use reel_orchestrator::scheduler::JobScheduler;
use reel_orchestrator::service::VideoService;
use reel_orchestrator::stage::{HttpStageClient, Stages};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "reel_orchestrator=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Reel Orchestrator...");

    let config = Config::from_env();
    config.validate().context("Invalid configuration")?;

    let (jobs, creators) = open_job_store(&config).await?;

    let artifacts = artifact::open(&config)
        .await
        .context("Failed to open artifact store")?;

    let stages = Stages::from_service(HttpStageClient::new(
        config.stage_service_url.clone(),
        config.stage_timeout,
    ));

    let renderer = render::select_backend(&config);
    tracing::info!("Render mode: {}", renderer.mode());

    let pipeline = Pipeline::new(jobs.clone(), artifacts.clone(), stages, renderer).with_retry(
        RetryPolicy {
            max_retries: config.stage_max_retries,
            base_delay: config.stage_retry_base,
        },
    );

    let (scheduler, handle) = JobScheduler::new(
        Arc::new(pipeline),
        jobs.clone(),
        config.max_parallel_jobs,
        config.sweep_interval,
    );
    tokio::spawn(scheduler.run());

    let service = VideoService::new(
        jobs,
        creators,
        artifacts,
        Arc::new(handle),
        config.list_page_size,
    );
    let app = api::create_router(AppState {
        service: Arc::new(service),
    });

    tracing::info!("Listening on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_addr))?;

    axum::serve(listener, app)
        .await
        .context("Failed to start server")?;

    Ok(())
}

async fn open_job_store(
    config: &Config,
) -> Result<(Arc<dyn JobRepository>, Arc<dyn CreatorDirectory>)> {
    let Some(database_url) = &config.database_url else {
        tracing::warn!("DATABASE_URL not set, keeping jobs in memory and accepting any creator");
        return Ok((
            Arc::new(InMemoryJobRepository::new()),
            Arc::new(StaticCreatorDirectory::open()),
        ));
    };

    tracing::info!("Connecting to database...");
    let pool = db::create_pool(database_url)
        .await
        .context("Failed to create database pool")?;

    db::run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;

    Ok((
        Arc::new(PgJobRepository::new(pool.clone())),
        Arc::new(PgCreatorDirectory::new(pool)),
    ))
}
