//! Repository Module
//!
//! Data access layer for the orchestrator. The job store is the single
//! source of truth for job state; every mutation the pipeline makes goes
//! through `JobRepository`, which guards terminal states and keeps artifact
//! references append-only.
//!
//! All repositories are trait-based so the pipeline can run against
//! Postgres in production and an in-memory store in tests and development.

pub mod creator;
pub mod job;
pub mod memory;

use async_trait::async_trait;
use reel_core::domain::artifact::ArtifactId;
use reel_core::domain::job::{JobStatus, VideoJob};
use reel_core::domain::render::RenderMode;
use reel_core::dto::job::GenerateOptions;
use uuid::Uuid;

pub use creator::{Creator, CreatorDirectory, PgCreatorDirectory, StaticCreatorDirectory};
pub use job::PgJobRepository;
pub use memory::InMemoryJobRepository;

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("job {0} not found")]
    NotFound(Uuid),
}

pub type Result<T> = std::result::Result<T, RepositoryError>;

/// Everything needed to insert a job record
#[derive(Debug, Clone)]
pub struct NewJob {
    pub id: Uuid,
    pub creator_id: String,
    pub prompt: String,
    pub options: GenerateOptions,
    pub version: u32,
    pub parent_job_id: Option<Uuid>,
    pub root_job_id: Uuid,
    pub iteration_prompt: Option<String>,
}

impl NewJob {
    /// Version 1 of a new chain; the job is its own root.
    pub fn fresh(creator_id: String, prompt: String, options: GenerateOptions) -> Self {
        let id = Uuid::new_v4();
        Self {
            id,
            creator_id,
            prompt,
            options,
            version: 1,
            parent_job_id: None,
            root_job_id: id,
            iteration_prompt: None,
        }
    }

    /// Child of `parent` carrying the feedback; settings are inherited.
    pub fn iteration(parent: &VideoJob, feedback: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            creator_id: parent.creator_id.clone(),
            prompt: parent.iteration_prompt_for(feedback),
            options: GenerateOptions {
                course_id: parent.course_id.clone(),
                product_id: parent.product_id.clone(),
                store_id: parent.store_id.clone(),
                style: parent.style.clone(),
                target_duration_seconds: parent.target_duration_seconds,
                aspect_ratio: parent.aspect_ratio.clone(),
                voice_id: parent.voice_id.clone(),
            },
            version: parent.version + 1,
            parent_job_id: Some(parent.id),
            root_job_id: parent.root_job_id,
            iteration_prompt: Some(feedback.to_string()),
        }
    }

    /// The queued record this request describes.
    pub fn into_job(self, created_at: chrono::DateTime<chrono::Utc>) -> VideoJob {
        VideoJob {
            id: self.id,
            creator_id: self.creator_id,
            course_id: self.options.course_id,
            product_id: self.options.product_id,
            store_id: self.options.store_id,
            prompt: self.prompt,
            style: self.options.style,
            target_duration_seconds: self.options.target_duration_seconds,
            aspect_ratio: self.options.aspect_ratio,
            voice_id: self.options.voice_id,
            status: JobStatus::Queued,
            progress: 0,
            error: None,
            script_id: None,
            image_ids: Vec::new(),
            audio_id: None,
            audio_duration_seconds: None,
            code_id: None,
            generated_code: None,
            video_id: None,
            thumbnail_id: None,
            version: self.version,
            parent_job_id: self.parent_job_id,
            root_job_id: self.root_job_id,
            iteration_prompt: self.iteration_prompt,
            retry_count: 0,
            render_mode: None,
            render_duration_seconds: None,
            cancel_requested: false,
            created_at,
            started_at: None,
            completed_at: None,
        }
    }
}

/// Artifact references produced by a stage.
///
/// Fields left `None` are untouched. Fields already set on the job are kept
/// as they are.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArtifactPatch {
    pub script_id: Option<ArtifactId>,
    pub image_ids: Option<Vec<ArtifactId>>,
    pub audio_id: Option<ArtifactId>,
    pub audio_duration_seconds: Option<f64>,
    pub code_id: Option<ArtifactId>,
    pub generated_code: Option<String>,
}

impl ArtifactPatch {
    pub(crate) fn apply(self, job: &mut VideoJob) {
        if job.script_id.is_none() {
            job.script_id = self.script_id;
        }
        if job.image_ids.is_empty() {
            if let Some(ids) = self.image_ids {
                job.image_ids = ids;
            }
        }
        if job.audio_id.is_none() {
            job.audio_id = self.audio_id;
        }
        if job.audio_duration_seconds.is_none() {
            job.audio_duration_seconds = self.audio_duration_seconds;
        }
        if job.code_id.is_none() {
            job.code_id = self.code_id;
        }
        if job.generated_code.is_none() {
            job.generated_code = self.generated_code;
        }
    }
}

/// What a cancellation request did to a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    /// The job was still queued and is now cancelled.
    Cancelled,
    /// The job is running; its pipeline stops at the next checkpoint.
    Requested(JobStatus),
    /// The job had already finished.
    Terminal(JobStatus),
}

/// Repository trait for video job persistence
///
/// Every transition method only touches jobs that are not terminal and
/// reports whether it did. Progress writes never move progress backwards.
#[async_trait]
pub trait JobRepository: Send + Sync {
    /// Inserts a queued job
    async fn create(&self, job: NewJob) -> Result<VideoJob>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<VideoJob>>;

    /// Jobs of one creator, newest first
    async fn find_by_creator(&self, creator_id: &str, limit: u32) -> Result<Vec<VideoJob>>;

    /// Jobs in a status, oldest first
    async fn find_by_status(&self, status: JobStatus) -> Result<Vec<VideoJob>>;

    /// Most recently created child of a job
    ///
    /// Children created at the same instant are ordered deterministically.
    async fn find_latest_child(&self, parent_id: Uuid) -> Result<Option<VideoJob>>;

    /// Moves a queued job to `scripting`
    ///
    /// Returns the claimed job, or `None` when it was not queued any more.
    /// At most one caller can claim a given job.
    async fn claim(&self, id: Uuid) -> Result<Option<VideoJob>>;

    /// Enters a pipeline state and raises progress to at least `progress`
    async fn advance(&self, id: Uuid, status: JobStatus, progress: u8) -> Result<bool>;

    /// Raises progress to at least `progress`
    async fn update_progress(&self, id: Uuid, progress: u8) -> Result<()>;

    async fn record_artifacts(&self, id: Uuid, patch: ArtifactPatch) -> Result<()>;

    /// Counts one more automatic retry and returns the new total
    async fn increment_retry(&self, id: Uuid) -> Result<u32>;

    async fn record_render(&self, id: Uuid, mode: RenderMode, duration_seconds: f64) -> Result<()>;

    /// Marks the job completed with progress 100
    async fn complete(
        &self,
        id: Uuid,
        video_id: ArtifactId,
        thumbnail_id: Option<ArtifactId>,
    ) -> Result<bool>;

    /// Marks the job failed with the given error
    async fn fail(&self, id: Uuid, error: &str) -> Result<bool>;

    /// Marks a running job cancelled after its pipeline observed the request
    async fn mark_cancelled(&self, id: Uuid) -> Result<bool>;

    /// Handles a cancellation request; `None` when the job does not exist
    async fn request_cancel(&self, id: Uuid) -> Result<Option<CancelOutcome>>;

    async fn is_cancel_requested(&self, id: Uuid) -> Result<bool>;
}
