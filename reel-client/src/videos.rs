//! Video job endpoints

use crate::error::Result;
use crate::{ReelClient, read_json};
use reel_core::dto::job::{
    CancelAccepted, GenerateVideo, IterateVideo, JobCreated, JobDetails, JobProgress, JobSummary,
    VersionEntry,
};
use uuid::Uuid;

impl ReelClient {
    // =============================================================================
    // Job Creation
    // =============================================================================

    /// Queue a fresh video
    ///
    /// Returns as soon as the job exists; poll [`ReelClient::get_progress`]
    /// to follow it.
    pub async fn generate(&self, req: &GenerateVideo) -> Result<JobCreated> {
        let url = self.url("/videos");
        tracing::debug!("POST {}", url);
        read_json(self.client.post(&url).json(req).send().await?).await
    }

    /// Queue the next version of an existing video
    pub async fn iterate(&self, job_id: Uuid, req: &IterateVideo) -> Result<JobCreated> {
        let url = self.url(&format!("/videos/{}/iterate", job_id));
        tracing::debug!("POST {}", url);
        read_json(self.client.post(&url).json(req).send().await?).await
    }

    pub async fn cancel(&self, job_id: Uuid) -> Result<CancelAccepted> {
        let url = self.url(&format!("/videos/{}/cancel", job_id));
        tracing::debug!("POST {}", url);
        read_json(self.client.post(&url).send().await?).await
    }

    // =============================================================================
    // Queries
    // =============================================================================

    pub async fn get_progress(&self, job_id: Uuid) -> Result<JobProgress> {
        let url = self.url(&format!("/videos/{}/progress", job_id));
        read_json(self.client.get(&url).send().await?).await
    }

    /// Full job with artifact URLs
    pub async fn get_job(&self, job_id: Uuid) -> Result<JobDetails> {
        let url = self.url(&format!("/videos/{}", job_id));
        read_json(self.client.get(&url).send().await?).await
    }

    /// Version chain containing the job, root first
    pub async fn history(&self, job_id: Uuid) -> Result<Vec<VersionEntry>> {
        let url = self.url(&format!("/videos/{}/history", job_id));
        read_json(self.client.get(&url).send().await?).await
    }

    /// A creator's jobs, newest first
    pub async fn list_jobs(&self, creator_id: &str, limit: Option<u32>) -> Result<Vec<JobSummary>> {
        let url = self.url(&format!("/creators/{}/videos", creator_id));
        let mut request = self.client.get(&url);
        if let Some(limit) = limit {
            request = request.query(&[("limit", limit)]);
        }
        read_json(request.send().await?).await
    }
}
