//! Pipeline orchestrator
//!
//! Drives one job through scripting, imaging, narration, code generation and
//! rendering. Stages run strictly in order; each stage's artifacts are stored
//! and recorded on the job before the next one starts. Every failure is
//! contained here and turned into a `failed` (or `cancelled`) job.

pub mod progress;

pub use progress::RenderProgressReporter;

use crate::artifact::{ArtifactError, ArtifactStore};
use crate::render::{RenderBackend, RenderError, render_to_artifact};
use crate::repository::{ArtifactPatch, JobRepository, RepositoryError};
use crate::stage::{
    AudioTrack, CodeRequest, ImageRequest, NarrationRequest, ScriptRequest, StageError, Stages,
};
use reel_core::domain::artifact::ArtifactId;
use reel_core::domain::job::{JobStatus, VideoJob};
use reel_core::domain::progress::ProgressWindow;
use reel_core::domain::render::RenderSpec;
use reel_core::domain::script::VideoScript;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Longest wait between two attempts of a stage.
const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("{stage} stage failed: {source}")]
    Stage {
        stage: &'static str,
        #[source]
        source: StageError,
    },

    #[error("rendering stage failed: {0}")]
    Render(#[source] RenderError),

    #[error("artifact storage failed: {0}")]
    Artifact(#[from] ArtifactError),

    #[error("artifact {0} is no longer available")]
    MissingArtifact(ArtifactId),

    #[error("job store failed: {0}")]
    Repository(#[from] RepositoryError),

    #[error("cancelled")]
    Cancelled,
}

impl From<RenderError> for PipelineError {
    fn from(error: RenderError) -> Self {
        match error {
            RenderError::Cancelled => PipelineError::Cancelled,
            other => PipelineError::Render(other),
        }
    }
}

/// Automatic stage retries with exponential backoff
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub const NONE: RetryPolicy = RetryPolicy {
        max_retries: 0,
        base_delay: Duration::ZERO,
    };

    /// Delay before retry number `attempt` (1-based)
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(MAX_RETRY_DELAY)
    }
}

fn stage_label(status: JobStatus) -> &'static str {
    match status {
        JobStatus::Scripting => "scripting",
        JobStatus::Imaging => "imaging",
        JobStatus::Narrating => "narrating",
        JobStatus::GeneratingCode => "code generation",
        JobStatus::Rendering => "rendering",
        other => other.as_str(),
    }
}

/// Everything the code generation stage needs from earlier stages
struct Media {
    image_ids: Vec<ArtifactId>,
    image_urls: Vec<String>,
    audio: Option<AudioTrack>,
}

pub struct Pipeline {
    jobs: Arc<dyn JobRepository>,
    artifacts: Arc<dyn ArtifactStore>,
    stages: Stages,
    renderer: Arc<dyn RenderBackend>,
    retry: RetryPolicy,
}

impl Pipeline {
    pub fn new(
        jobs: Arc<dyn JobRepository>,
        artifacts: Arc<dyn ArtifactStore>,
        stages: Stages,
        renderer: Arc<dyn RenderBackend>,
    ) -> Self {
        Self {
            jobs,
            artifacts,
            stages,
            renderer,
            retry: RetryPolicy::NONE,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Claims a queued job and runs it to a terminal state.
    ///
    /// Does nothing when the job is no longer queued.
    pub async fn run(&self, job_id: Uuid) {
        let job = match self.jobs.claim(job_id).await {
            Ok(Some(job)) => job,
            Ok(None) => {
                tracing::debug!(job_id = %job_id, "Job not queued, skipping");
                return;
            }
            Err(e) => {
                tracing::error!(job_id = %job_id, "Failed to claim job: {}", e);
                return;
            }
        };

        tracing::info!(job_id = %job_id, version = job.version, "Pipeline started");
        let started = Instant::now();

        match self.execute(&job).await {
            Ok(()) => {
                tracing::info!(
                    job_id = %job_id,
                    elapsed_secs = started.elapsed().as_secs_f64(),
                    "Pipeline completed"
                );
            }
            Err(PipelineError::Cancelled) => {
                tracing::info!(job_id = %job_id, "Pipeline cancelled");
                if let Err(e) = self.jobs.mark_cancelled(job_id).await {
                    tracing::error!(job_id = %job_id, "Failed to record cancellation: {}", e);
                }
            }
            Err(e) => {
                tracing::error!(job_id = %job_id, "Pipeline failed: {}", e);
                if let Err(store_err) = self.jobs.fail(job_id, &e.to_string()).await {
                    tracing::error!(job_id = %job_id, "Failed to record failure: {}", store_err);
                }
            }
        }
    }

    async fn execute(&self, job: &VideoJob) -> Result<(), PipelineError> {
        let script = self.write_script(job).await?;
        let (image_ids, image_urls) = self.illustrate(job, &script).await?;
        let audio = self.narrate(job, &script).await?;
        let media = Media {
            image_ids,
            image_urls,
            audio,
        };
        let code = self.generate_code(job, &script, &media).await?;
        let video_id = self.render(job, code, &media).await?;

        self.checkpoint(job.id).await?;
        let thumbnail_id = media.image_ids.first().cloned();
        if !self.jobs.complete(job.id, video_id, thumbnail_id).await? {
            return Err(PipelineError::Cancelled);
        }
        Ok(())
    }

    async fn write_script(&self, job: &VideoJob) -> Result<VideoScript, PipelineError> {
        // The claim already moved the job into scripting
        self.checkpoint(job.id).await?;
        tracing::info!(job_id = %job.id, "Scripting");

        let req = ScriptRequest {
            prompt: job.prompt.clone(),
            style: job.style.clone(),
            target_duration_seconds: job.target_duration_seconds,
            aspect_ratio: job.aspect_ratio.clone(),
            simplified: false,
        };
        let script = self
            .with_retries(job.id, JobStatus::Scripting, || {
                self.stages.script_writer.write_script(&req)
            })
            .await?;

        let bytes = serde_json::to_vec(&script).map_err(|e| PipelineError::Stage {
            stage: stage_label(JobStatus::Scripting),
            source: StageError::InvalidOutput(e.to_string()),
        })?;
        let script_id = self.artifacts.put(bytes, "application/json").await?;
        self.jobs
            .record_artifacts(
                job.id,
                ArtifactPatch {
                    script_id: Some(script_id),
                    ..Default::default()
                },
            )
            .await?;

        Ok(script)
    }

    async fn illustrate(
        &self,
        job: &VideoJob,
        script: &VideoScript,
    ) -> Result<(Vec<ArtifactId>, Vec<String>), PipelineError> {
        let window = self.enter(job.id, JobStatus::Imaging).await?;

        if script.image_prompts.is_empty() {
            tracing::info!(job_id = %job.id, "Script has no image prompts");
            return Ok((Vec::new(), Vec::new()));
        }

        let req = ImageRequest {
            prompts: script.image_prompts.clone(),
            style: job.style.clone(),
            aspect_ratio: job.aspect_ratio.clone(),
        };
        let images = self
            .with_retries(job.id, JobStatus::Imaging, || {
                self.stages.illustrator.illustrate(&req)
            })
            .await?;

        let total = images.len();
        let mut ids = Vec::with_capacity(total);
        for (i, image) in images.into_iter().enumerate() {
            ids.push(self.artifacts.put(image.bytes, &image.content_type).await?);
            let fraction = (i + 1) as f64 / total as f64;
            self.jobs.update_progress(job.id, window.at(fraction)).await?;
        }
        let urls = self.resolve_all(&ids).await?;

        self.jobs
            .record_artifacts(
                job.id,
                ArtifactPatch {
                    image_ids: Some(ids.clone()),
                    ..Default::default()
                },
            )
            .await?;

        Ok((ids, urls))
    }

    async fn narrate(
        &self,
        job: &VideoJob,
        script: &VideoScript,
    ) -> Result<Option<AudioTrack>, PipelineError> {
        self.enter(job.id, JobStatus::Narrating).await?;

        let req = NarrationRequest {
            text: script.voiceover_script.clone(),
            voice_id: job.voice_id.clone(),
        };
        let narration = self
            .with_retries(job.id, JobStatus::Narrating, || {
                self.stages.narrator.narrate(&req)
            })
            .await?;

        let audio_id = self
            .artifacts
            .put(narration.bytes, &narration.content_type)
            .await?;
        let url = self.resolve(&audio_id).await?;
        self.jobs
            .record_artifacts(
                job.id,
                ArtifactPatch {
                    audio_id: Some(audio_id),
                    audio_duration_seconds: Some(narration.duration_seconds),
                    ..Default::default()
                },
            )
            .await?;

        Ok(Some(AudioTrack {
            url,
            duration_seconds: narration.duration_seconds,
            words: narration.words,
        }))
    }

    async fn generate_code(
        &self,
        job: &VideoJob,
        script: &VideoScript,
        media: &Media,
    ) -> Result<String, PipelineError> {
        self.enter(job.id, JobStatus::GeneratingCode).await?;

        let previous_code = match job.parent_job_id {
            Some(parent_id) => self
                .jobs
                .find_by_id(parent_id)
                .await?
                .and_then(|parent| parent.generated_code),
            None => None,
        };

        let spec = RenderSpec::new(
            String::new(),
            Vec::new(),
            None,
            job.target_duration_seconds,
            &job.aspect_ratio,
        );
        let req = CodeRequest {
            script: script.clone(),
            image_urls: media.image_urls.clone(),
            audio: media.audio.clone(),
            total_frames: spec.total_frames,
            fps: spec.fps,
            width: spec.width,
            height: spec.height,
            previous_code,
            iteration_feedback: job.iteration_prompt.clone(),
            repair_notes: Vec::new(),
        };
        let code = self
            .with_retries(job.id, JobStatus::GeneratingCode, || {
                self.stages.code_generator.generate_code(&req)
            })
            .await?;

        let code_id = self
            .artifacts
            .put(code.clone().into_bytes(), "text/javascript")
            .await?;
        self.jobs
            .record_artifacts(
                job.id,
                ArtifactPatch {
                    code_id: Some(code_id),
                    generated_code: Some(code.clone()),
                    ..Default::default()
                },
            )
            .await?;

        Ok(code)
    }

    async fn render(
        &self,
        job: &VideoJob,
        code: String,
        media: &Media,
    ) -> Result<ArtifactId, PipelineError> {
        let window = self.enter(job.id, JobStatus::Rendering).await?;

        let spec = RenderSpec::new(
            code,
            media.image_urls.clone(),
            media.audio.as_ref().map(|a| a.url.clone()),
            job.target_duration_seconds,
            &job.aspect_ratio,
        );
        let reporter = RenderProgressReporter::new(self.jobs.clone(), job.id, window);

        let started = Instant::now();
        let rendered = render_to_artifact(
            self.renderer.as_ref(),
            self.artifacts.as_ref(),
            &spec,
            &reporter,
        )
        .await?;
        let elapsed = started.elapsed().as_secs_f64();

        self.jobs
            .record_render(job.id, rendered.mode, elapsed)
            .await?;
        self.jobs
            .update_progress(job.id, ProgressWindow::FINALIZE.low)
            .await?;
        tracing::info!(
            job_id = %job.id,
            mode = %rendered.mode,
            frames = rendered.contract.frames,
            elapsed_secs = elapsed,
            "Render finished"
        );

        Ok(rendered.video_id)
    }

    /// Enters a stage state after a cancellation check
    async fn enter(&self, job_id: Uuid, status: JobStatus) -> Result<ProgressWindow, PipelineError> {
        self.checkpoint(job_id).await?;
        let window = status.progress_window().unwrap_or(ProgressWindow::FINALIZE);
        if !self.jobs.advance(job_id, status, window.low).await? {
            // Someone else finished the job
            return Err(PipelineError::Cancelled);
        }
        tracing::info!(job_id = %job_id, status = %status, "Stage started");
        Ok(window)
    }

    async fn checkpoint(&self, job_id: Uuid) -> Result<(), PipelineError> {
        if self.jobs.is_cancel_requested(job_id).await? {
            return Err(PipelineError::Cancelled);
        }
        Ok(())
    }

    async fn with_retries<T, F, Fut>(
        &self,
        job_id: Uuid,
        status: JobStatus,
        mut call: F,
    ) -> Result<T, PipelineError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StageError>>,
    {
        let mut attempt = 0;
        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < self.retry.max_retries && e.is_transient() => {
                    attempt += 1;
                    let total = self.jobs.increment_retry(job_id).await?;
                    let delay = self.retry.delay(attempt);
                    tracing::warn!(
                        job_id = %job_id,
                        stage = stage_label(status),
                        attempt,
                        retry_count = total,
                        "Stage failed ({}), retrying in {:?}",
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    self.checkpoint(job_id).await?;
                }
                Err(e) => {
                    return Err(PipelineError::Stage {
                        stage: stage_label(status),
                        source: e,
                    });
                }
            }
        }
    }

    async fn resolve(&self, id: &ArtifactId) -> Result<String, PipelineError> {
        self.artifacts
            .url(id)
            .await?
            .ok_or_else(|| PipelineError::MissingArtifact(id.clone()))
    }

    async fn resolve_all(&self, ids: &[ArtifactId]) -> Result<Vec<String>, PipelineError> {
        let mut urls = Vec::with_capacity(ids.len());
        for id in ids {
            urls.push(self.resolve(id).await?);
        }
        Ok(urls)
    }
}
