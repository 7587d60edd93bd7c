//! Job Repository
//!
//! Postgres implementation of `JobRepository`. Every transition is a single
//! conditional UPDATE so concurrent writers cannot resurrect a terminal job.

use super::{ArtifactPatch, CancelOutcome, JobRepository, NewJob, Result};
use async_trait::async_trait;
use reel_core::domain::artifact::ArtifactId;
use reel_core::domain::job::{CANCELLED_MESSAGE, JobStatus, VideoJob};
use reel_core::domain::render::RenderMode;
use sqlx::PgPool;
use uuid::Uuid;

const JOB_COLUMNS: &str = r#"
    id, creator_id, course_id, product_id, store_id,
    prompt, style, target_duration_seconds, aspect_ratio, voice_id,
    status, progress, error,
    script_id, image_ids, audio_id, audio_duration_seconds, code_id, generated_code,
    video_id, thumbnail_id,
    version, parent_job_id, root_job_id, iteration_prompt, retry_count,
    render_mode, render_duration_seconds, cancel_requested,
    created_at, started_at, completed_at
"#;

const NOT_TERMINAL: &str = "status NOT IN ('completed', 'failed', 'cancelled')";

#[derive(Clone)]
pub struct PgJobRepository {
    pool: PgPool,
}

impl PgJobRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobRepository for PgJobRepository {
    async fn create(&self, req: NewJob) -> Result<VideoJob> {
        let job = req.into_job(chrono::Utc::now());

        sqlx::query(
            r#"
            INSERT INTO video_jobs (
                id, creator_id, course_id, product_id, store_id,
                prompt, style, target_duration_seconds, aspect_ratio, voice_id,
                status, progress, version, parent_job_id, root_job_id,
                iteration_prompt, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, 0, $12, $13, $14, $15, $16)
            "#,
        )
        .bind(job.id)
        .bind(&job.creator_id)
        .bind(&job.course_id)
        .bind(&job.product_id)
        .bind(&job.store_id)
        .bind(&job.prompt)
        .bind(&job.style)
        .bind(job.target_duration_seconds as i32)
        .bind(&job.aspect_ratio)
        .bind(&job.voice_id)
        .bind(JobStatus::Queued.as_str())
        .bind(job.version as i32)
        .bind(job.parent_job_id)
        .bind(job.root_job_id)
        .bind(&job.iteration_prompt)
        .bind(job.created_at)
        .execute(&self.pool)
        .await?;

        Ok(job)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<VideoJob>> {
        let sql = format!("SELECT {JOB_COLUMNS} FROM video_jobs WHERE id = $1");
        let row = sqlx::query_as::<_, JobRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| r.into()))
    }

    async fn find_by_creator(&self, creator_id: &str, limit: u32) -> Result<Vec<VideoJob>> {
        let sql = format!(
            "SELECT {JOB_COLUMNS} FROM video_jobs WHERE creator_id = $1 \
             ORDER BY created_at DESC, id DESC LIMIT $2"
        );
        let rows = sqlx::query_as::<_, JobRow>(&sql)
            .bind(creator_id)
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }

    async fn find_by_status(&self, status: JobStatus) -> Result<Vec<VideoJob>> {
        let sql = format!(
            "SELECT {JOB_COLUMNS} FROM video_jobs WHERE status = $1 ORDER BY created_at ASC"
        );
        let rows = sqlx::query_as::<_, JobRow>(&sql)
            .bind(status.as_str())
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }

    async fn find_latest_child(&self, parent_id: Uuid) -> Result<Option<VideoJob>> {
        let sql = format!(
            "SELECT {JOB_COLUMNS} FROM video_jobs WHERE parent_job_id = $1 \
             ORDER BY created_at DESC, id DESC LIMIT 1"
        );
        let row = sqlx::query_as::<_, JobRow>(&sql)
            .bind(parent_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| r.into()))
    }

    async fn claim(&self, id: Uuid) -> Result<Option<VideoJob>> {
        let sql = format!(
            "UPDATE video_jobs SET status = 'scripting', started_at = $2 \
             WHERE id = $1 AND status = 'queued' RETURNING {JOB_COLUMNS}"
        );
        let row = sqlx::query_as::<_, JobRow>(&sql)
            .bind(id)
            .bind(chrono::Utc::now())
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| r.into()))
    }

    async fn advance(&self, id: Uuid, status: JobStatus, progress: u8) -> Result<bool> {
        let sql = format!(
            "UPDATE video_jobs SET status = $2, progress = GREATEST(progress, $3) \
             WHERE id = $1 AND {NOT_TERMINAL}"
        );
        let result = sqlx::query(&sql)
            .bind(id)
            .bind(status.as_str())
            .bind(i16::from(progress))
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn update_progress(&self, id: Uuid, progress: u8) -> Result<()> {
        let sql = format!(
            "UPDATE video_jobs SET progress = GREATEST(progress, $2) \
             WHERE id = $1 AND {NOT_TERMINAL}"
        );
        sqlx::query(&sql)
            .bind(id)
            .bind(i16::from(progress.min(100)))
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn record_artifacts(&self, id: Uuid, patch: ArtifactPatch) -> Result<()> {
        let image_ids: Option<Vec<String>> = patch
            .image_ids
            .map(|ids| ids.into_iter().map(ArtifactId::into_inner).collect());

        // Existing references win over new ones
        sqlx::query(
            r#"
            UPDATE video_jobs
            SET script_id = COALESCE(script_id, $2),
                image_ids = CASE WHEN cardinality(image_ids) = 0
                                 THEN COALESCE($3, image_ids)
                                 ELSE image_ids END,
                audio_id = COALESCE(audio_id, $4),
                audio_duration_seconds = COALESCE(audio_duration_seconds, $5),
                code_id = COALESCE(code_id, $6),
                generated_code = COALESCE(generated_code, $7)
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(patch.script_id.map(ArtifactId::into_inner))
        .bind(image_ids)
        .bind(patch.audio_id.map(ArtifactId::into_inner))
        .bind(patch.audio_duration_seconds)
        .bind(patch.code_id.map(ArtifactId::into_inner))
        .bind(patch.generated_code)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn increment_retry(&self, id: Uuid) -> Result<u32> {
        let count: Option<i32> = sqlx::query_scalar(
            "UPDATE video_jobs SET retry_count = retry_count + 1 WHERE id = $1 RETURNING retry_count",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        count
            .map(|c| c as u32)
            .ok_or(super::RepositoryError::NotFound(id))
    }

    async fn record_render(&self, id: Uuid, mode: RenderMode, duration_seconds: f64) -> Result<()> {
        sqlx::query(
            "UPDATE video_jobs SET render_mode = $2, render_duration_seconds = $3 WHERE id = $1",
        )
        .bind(id)
        .bind(mode.as_str())
        .bind(duration_seconds)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn complete(
        &self,
        id: Uuid,
        video_id: ArtifactId,
        thumbnail_id: Option<ArtifactId>,
    ) -> Result<bool> {
        let sql = format!(
            "UPDATE video_jobs SET status = 'completed', progress = 100, \
             video_id = COALESCE(video_id, $2), thumbnail_id = COALESCE(thumbnail_id, $3), \
             error = NULL, completed_at = $4 \
             WHERE id = $1 AND {NOT_TERMINAL}"
        );
        let result = sqlx::query(&sql)
            .bind(id)
            .bind(video_id.into_inner())
            .bind(thumbnail_id.map(ArtifactId::into_inner))
            .bind(chrono::Utc::now())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn fail(&self, id: Uuid, error: &str) -> Result<bool> {
        let sql = format!(
            "UPDATE video_jobs SET status = 'failed', error = $2, completed_at = $3 \
             WHERE id = $1 AND {NOT_TERMINAL}"
        );
        let result = sqlx::query(&sql)
            .bind(id)
            .bind(error)
            .bind(chrono::Utc::now())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn mark_cancelled(&self, id: Uuid) -> Result<bool> {
        let sql = format!(
            "UPDATE video_jobs SET status = 'cancelled', error = $2, cancel_requested = TRUE, \
             completed_at = $3 WHERE id = $1 AND {NOT_TERMINAL}"
        );
        let result = sqlx::query(&sql)
            .bind(id)
            .bind(CANCELLED_MESSAGE)
            .bind(chrono::Utc::now())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn request_cancel(&self, id: Uuid) -> Result<Option<CancelOutcome>> {
        // A queued job has no pipeline yet, so it can be cancelled on the spot
        let cancelled = sqlx::query(
            "UPDATE video_jobs SET status = 'cancelled', error = $2, cancel_requested = TRUE, \
             completed_at = $3 WHERE id = $1 AND status = 'queued'",
        )
        .bind(id)
        .bind(CANCELLED_MESSAGE)
        .bind(chrono::Utc::now())
        .execute(&self.pool)
        .await?;

        if cancelled.rows_affected() > 0 {
            return Ok(Some(CancelOutcome::Cancelled));
        }

        let sql = format!(
            "UPDATE video_jobs SET cancel_requested = TRUE \
             WHERE id = $1 AND status <> 'queued' AND {NOT_TERMINAL} RETURNING status"
        );
        let running: Option<String> = sqlx::query_scalar(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        if let Some(status) = running {
            return Ok(Some(CancelOutcome::Requested(parse_status(&status))));
        }

        Ok(self
            .find_by_id(id)
            .await?
            .map(|job| CancelOutcome::Terminal(job.status)))
    }

    async fn is_cancel_requested(&self, id: Uuid) -> Result<bool> {
        let flag: Option<bool> =
            sqlx::query_scalar("SELECT cancel_requested FROM video_jobs WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(flag.unwrap_or(false))
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

fn parse_status(s: &str) -> JobStatus {
    s.parse().unwrap_or_else(|e| {
        tracing::warn!("{}; treating job as failed", e);
        JobStatus::Failed
    })
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct JobRow {
    id: Uuid,
    creator_id: String,
    course_id: Option<String>,
    product_id: Option<String>,
    store_id: Option<String>,
    prompt: String,
    style: String,
    target_duration_seconds: i32,
    aspect_ratio: String,
    voice_id: Option<String>,
    status: String,
    progress: i16,
    error: Option<String>,
    script_id: Option<String>,
    image_ids: Vec<String>,
    audio_id: Option<String>,
    audio_duration_seconds: Option<f64>,
    code_id: Option<String>,
    generated_code: Option<String>,
    video_id: Option<String>,
    thumbnail_id: Option<String>,
    version: i32,
    parent_job_id: Option<Uuid>,
    root_job_id: Uuid,
    iteration_prompt: Option<String>,
    retry_count: i32,
    render_mode: Option<String>,
    render_duration_seconds: Option<f64>,
    cancel_requested: bool,
    created_at: chrono::DateTime<chrono::Utc>,
    started_at: Option<chrono::DateTime<chrono::Utc>>,
    completed_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl From<JobRow> for VideoJob {
    fn from(row: JobRow) -> Self {
        VideoJob {
            id: row.id,
            creator_id: row.creator_id,
            course_id: row.course_id,
            product_id: row.product_id,
            store_id: row.store_id,
            prompt: row.prompt,
            style: row.style,
            target_duration_seconds: row.target_duration_seconds.max(0) as u32,
            aspect_ratio: row.aspect_ratio,
            voice_id: row.voice_id,
            status: parse_status(&row.status),
            progress: row.progress.clamp(0, 100) as u8,
            error: row.error,
            script_id: row.script_id.map(ArtifactId::from),
            image_ids: row.image_ids.into_iter().map(ArtifactId::from).collect(),
            audio_id: row.audio_id.map(ArtifactId::from),
            audio_duration_seconds: row.audio_duration_seconds,
            code_id: row.code_id.map(ArtifactId::from),
            generated_code: row.generated_code,
            video_id: row.video_id.map(ArtifactId::from),
            thumbnail_id: row.thumbnail_id.map(ArtifactId::from),
            version: row.version.max(1) as u32,
            parent_job_id: row.parent_job_id,
            root_job_id: row.root_job_id,
            iteration_prompt: row.iteration_prompt,
            retry_count: row.retry_count.max(0) as u32,
            render_mode: row.render_mode.and_then(|m| m.parse().ok()),
            render_duration_seconds: row.render_duration_seconds,
            cancel_requested: row.cancel_requested,
            created_at: row.created_at,
            started_at: row.started_at,
            completed_at: row.completed_at,
        }
    }
}
