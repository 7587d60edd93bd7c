//! Read side of the video service
//!
//! Artifact ids are resolved into URLs on every read. A blob the store no
//! longer knows resolves to no URL instead of failing the whole read.

use reel_core::domain::artifact::ArtifactId;
use reel_core::dto::job::{JobDetails, JobProgress, JobSummary};
use uuid::Uuid;

use super::VideoService;
use super::error::{ServiceError, ServiceResult};
use crate::config::MAX_PAGE_SIZE;

impl VideoService {
    pub async fn get_progress(&self, job_id: Uuid) -> ServiceResult<JobProgress> {
        let job = self
            .jobs
            .find_by_id(job_id)
            .await?
            .ok_or(ServiceError::NotFound(job_id))?;

        Ok(JobProgress {
            job_id: job.id,
            status: job.status,
            progress: job.progress,
            video_url: self.resolve(job.video_id.as_ref()).await?,
            thumbnail_url: self.resolve(job.thumbnail_id.as_ref()).await?,
            error: job.error,
        })
    }

    /// Full projection with every artifact resolved
    pub async fn get_job(&self, job_id: Uuid) -> ServiceResult<JobDetails> {
        let job = self
            .jobs
            .find_by_id(job_id)
            .await?
            .ok_or(ServiceError::NotFound(job_id))?;

        let mut image_urls = Vec::with_capacity(job.image_ids.len());
        for id in &job.image_ids {
            if let Some(url) = self.resolve(Some(id)).await? {
                image_urls.push(url);
            }
        }
        let audio_url = self.resolve(job.audio_id.as_ref()).await?;
        let video_url = self.resolve(job.video_id.as_ref()).await?;
        let thumbnail_url = self.resolve(job.thumbnail_id.as_ref()).await?;

        Ok(JobDetails {
            job,
            image_urls,
            audio_url,
            video_url,
            thumbnail_url,
        })
    }

    /// A creator's jobs, newest first
    ///
    /// `limit` defaults to the configured page size and is capped at
    /// [`MAX_PAGE_SIZE`].
    pub async fn list_jobs(
        &self,
        creator_id: &str,
        limit: Option<u32>,
    ) -> ServiceResult<Vec<JobSummary>> {
        let limit = limit.unwrap_or(self.page_size).clamp(1, MAX_PAGE_SIZE);
        let jobs = self.jobs.find_by_creator(creator_id, limit).await?;
        Ok(jobs.into_iter().map(JobSummary::from).collect())
    }

    async fn resolve(&self, id: Option<&ArtifactId>) -> ServiceResult<Option<String>> {
        match id {
            Some(id) => Ok(self.artifacts.url(id).await?),
            None => Ok(None),
        }
    }
}
