//! Video Service
//!
//! Entry points that create or stop jobs. Creation returns as soon as the
//! job record exists; the pipeline runs later on the scheduler.

use std::sync::Arc;

use reel_core::domain::job::{ASPECT_RATIOS, JobStatus, is_supported_aspect_ratio};
use reel_core::dto::job::{CancelAccepted, GenerateVideo, IterateVideo, JobCreated};
use uuid::Uuid;

use super::error::{ServiceError, ServiceResult};
use crate::artifact::ArtifactStore;
use crate::repository::{CancelOutcome, Creator, CreatorDirectory, JobRepository, NewJob};
use crate::scheduler::Dispatcher;

/// Longest video a job may ask for
pub const MAX_DURATION_SECONDS: u32 = 600;

pub struct VideoService {
    pub(super) jobs: Arc<dyn JobRepository>,
    pub(super) creators: Arc<dyn CreatorDirectory>,
    pub(super) artifacts: Arc<dyn ArtifactStore>,
    pub(super) dispatcher: Arc<dyn Dispatcher>,
    pub(super) page_size: u32,
}

impl VideoService {
    pub fn new(
        jobs: Arc<dyn JobRepository>,
        creators: Arc<dyn CreatorDirectory>,
        artifacts: Arc<dyn ArtifactStore>,
        dispatcher: Arc<dyn Dispatcher>,
        page_size: u32,
    ) -> Self {
        Self {
            jobs,
            creators,
            artifacts,
            dispatcher,
            page_size,
        }
    }

    /// Queues a fresh version-1 job
    pub async fn generate(&self, req: GenerateVideo) -> ServiceResult<JobCreated> {
        let prompt = req.prompt.trim();
        if prompt.is_empty() {
            return Err(ServiceError::Validation("prompt must not be empty".into()));
        }
        let duration = req.options.target_duration_seconds;
        if duration == 0 || duration > MAX_DURATION_SECONDS {
            return Err(ServiceError::Validation(format!(
                "target_duration_seconds must be between 1 and {}, got {}",
                MAX_DURATION_SECONDS, duration
            )));
        }
        if !is_supported_aspect_ratio(&req.options.aspect_ratio) {
            return Err(ServiceError::Validation(format!(
                "unsupported aspect ratio '{}', expected one of {}",
                req.options.aspect_ratio,
                ASPECT_RATIOS.join(", ")
            )));
        }

        let creator = self.known_creator(&req.creator_id).await?;

        let mut options = req.options;
        if options.store_id.is_none() {
            options.store_id = creator.default_store_id;
        }

        let job = self
            .jobs
            .create(NewJob::fresh(creator.id, prompt.to_string(), options))
            .await?;

        tracing::info!(
            job_id = %job.id,
            creator_id = %job.creator_id,
            "Video job created ({}s, {})",
            job.target_duration_seconds,
            job.aspect_ratio
        );
        self.dispatcher.dispatch(job.id);

        Ok(JobCreated { job_id: job.id })
    }

    /// Queues the next version of an existing job
    pub async fn iterate(&self, parent_id: Uuid, req: IterateVideo) -> ServiceResult<JobCreated> {
        let feedback = req.feedback.trim();
        if feedback.is_empty() {
            return Err(ServiceError::Validation("feedback must not be empty".into()));
        }

        let creator = self.known_creator(&req.creator_id).await?;
        let parent = self
            .jobs
            .find_by_id(parent_id)
            .await?
            .ok_or(ServiceError::NotFound(parent_id))?;
        if parent.creator_id != creator.id {
            return Err(ServiceError::Forbidden {
                job_id: parent_id,
                creator_id: creator.id,
            });
        }

        let job = self.jobs.create(NewJob::iteration(&parent, feedback)).await?;

        tracing::info!(
            job_id = %job.id,
            parent_job_id = %parent.id,
            "Iteration created (version {})",
            job.version
        );
        self.dispatcher.dispatch(job.id);

        Ok(JobCreated { job_id: job.id })
    }

    /// Requests cancellation of a queued or running job
    pub async fn cancel(&self, job_id: Uuid) -> ServiceResult<CancelAccepted> {
        let outcome = self
            .jobs
            .request_cancel(job_id)
            .await?
            .ok_or(ServiceError::NotFound(job_id))?;

        let status = match outcome {
            CancelOutcome::Cancelled => {
                tracing::info!(job_id = %job_id, "Queued job cancelled");
                JobStatus::Cancelled
            }
            CancelOutcome::Requested(status) => {
                tracing::info!(job_id = %job_id, "Cancellation requested while {}", status);
                status
            }
            CancelOutcome::Terminal(status) => {
                return Err(ServiceError::InvalidState(format!(
                    "video job {} is already {}",
                    job_id, status
                )));
            }
        };

        Ok(CancelAccepted { job_id, status })
    }

    async fn known_creator(&self, creator_id: &str) -> ServiceResult<Creator> {
        self.creators
            .find(creator_id)
            .await?
            .ok_or_else(|| ServiceError::UnknownCreator(creator_id.to_string()))
    }
}
