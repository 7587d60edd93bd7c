use sqlx::{PgPool, postgres::PgPoolOptions};
use std::time::Duration;

pub async fn create_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url)
        .await
}

pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    // Creators are owned by the marketplace; the pipeline only reads them
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS creators (
            id VARCHAR(255) PRIMARY KEY,
            default_store_id VARCHAR(255),
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create video jobs table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS video_jobs (
            id UUID PRIMARY KEY,
            creator_id VARCHAR(255) NOT NULL,
            course_id VARCHAR(255),
            product_id VARCHAR(255),
            store_id VARCHAR(255),
            prompt TEXT NOT NULL,
            style VARCHAR(100) NOT NULL,
            target_duration_seconds INTEGER NOT NULL,
            aspect_ratio VARCHAR(20) NOT NULL,
            voice_id VARCHAR(255),
            status VARCHAR(50) NOT NULL,
            progress SMALLINT NOT NULL DEFAULT 0,
            error TEXT,
            script_id TEXT,
            image_ids TEXT[] NOT NULL DEFAULT '{}',
            audio_id TEXT,
            audio_duration_seconds DOUBLE PRECISION,
            code_id TEXT,
            generated_code TEXT,
            video_id TEXT,
            thumbnail_id TEXT,
            version INTEGER NOT NULL DEFAULT 1,
            parent_job_id UUID REFERENCES video_jobs(id),
            root_job_id UUID NOT NULL,
            iteration_prompt TEXT,
            retry_count INTEGER NOT NULL DEFAULT 0,
            render_mode VARCHAR(20),
            render_duration_seconds DOUBLE PRECISION,
            cancel_requested BOOLEAN NOT NULL DEFAULT FALSE,
            created_at TIMESTAMPTZ NOT NULL,
            started_at TIMESTAMPTZ,
            completed_at TIMESTAMPTZ
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create indexes for better query performance
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_video_jobs_status ON video_jobs(status)")
        .execute(pool)
        .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_video_jobs_creator ON video_jobs(creator_id, created_at DESC)",
    )
    .execute(pool)
    .await?;

    // Forward walks of a version chain look children up by parent
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_video_jobs_parent ON video_jobs(parent_job_id, created_at DESC)",
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_video_jobs_root ON video_jobs(root_job_id)")
        .execute(pool)
        .await?;

    tracing::info!("Database migrations completed successfully");
    Ok(())
}
