//! Version history
//!
//! A chain is walked from its root forward, one child lookup per level. When
//! a job has several children (a retried iteration, or two iterations racing
//! on the same parent) the most recently created one continues the chain.

use std::collections::HashSet;

use reel_core::dto::job::VersionEntry;
use uuid::Uuid;

use super::VideoService;
use super::error::{ServiceError, ServiceResult};

impl VideoService {
    /// Root-to-latest chain containing the job's root
    pub async fn get_version_history(&self, job_id: Uuid) -> ServiceResult<Vec<VersionEntry>> {
        let job = self
            .jobs
            .find_by_id(job_id)
            .await?
            .ok_or(ServiceError::NotFound(job_id))?;

        let root = if job.root_job_id == job.id {
            job
        } else {
            self.jobs
                .find_by_id(job.root_job_id)
                .await?
                .ok_or(ServiceError::NotFound(job.root_job_id))?
        };

        let mut seen = HashSet::from([root.id]);
        let mut chain = vec![VersionEntry::from(&root)];
        let mut current = root.id;

        while let Some(child) = self.jobs.find_latest_child(current).await? {
            if !seen.insert(child.id) {
                tracing::warn!(job_id = %child.id, "Version chain loops back, stopping walk");
                break;
            }
            chain.push(VersionEntry::from(&child));
            current = child.id;
        }

        Ok(chain)
    }
}
