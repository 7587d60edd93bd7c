//! In-memory job repository
//!
//! Backs the orchestrator when no database is configured and drives the
//! pipeline in tests. Semantics match `PgJobRepository`; ties on
//! `created_at` go to the job inserted last.

use super::{ArtifactPatch, CancelOutcome, JobRepository, NewJob, RepositoryError, Result};
use async_trait::async_trait;
use reel_core::domain::artifact::ArtifactId;
use reel_core::domain::job::{CANCELLED_MESSAGE, JobStatus, VideoJob};
use reel_core::domain::render::RenderMode;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
pub struct InMemoryJobRepository {
    // Insertion order doubles as the tie-break for equal timestamps
    jobs: RwLock<Vec<VideoJob>>,
}

impl InMemoryJobRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies `f` to a non-terminal job and reports whether it ran.
    async fn update_active(&self, id: Uuid, f: impl FnOnce(&mut VideoJob)) -> bool {
        let mut jobs = self.jobs.write().await;
        match jobs.iter_mut().find(|j| j.id == id) {
            Some(job) if !job.is_terminal() => {
                f(job);
                true
            }
            _ => false,
        }
    }
}

#[async_trait]
impl JobRepository for InMemoryJobRepository {
    async fn create(&self, req: NewJob) -> Result<VideoJob> {
        let job = req.into_job(chrono::Utc::now());
        self.jobs.write().await.push(job.clone());
        Ok(job)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<VideoJob>> {
        let jobs = self.jobs.read().await;
        Ok(jobs.iter().find(|j| j.id == id).cloned())
    }

    async fn find_by_creator(&self, creator_id: &str, limit: u32) -> Result<Vec<VideoJob>> {
        let jobs = self.jobs.read().await;
        let mut owned: Vec<(usize, &VideoJob)> = jobs
            .iter()
            .enumerate()
            .filter(|(_, j)| j.creator_id == creator_id)
            .collect();
        owned.sort_by(|(ia, a), (ib, b)| b.created_at.cmp(&a.created_at).then(ib.cmp(ia)));

        Ok(owned
            .into_iter()
            .take(limit as usize)
            .map(|(_, j)| j.clone())
            .collect())
    }

    async fn find_by_status(&self, status: JobStatus) -> Result<Vec<VideoJob>> {
        let jobs = self.jobs.read().await;
        let mut matching: Vec<VideoJob> =
            jobs.iter().filter(|j| j.status == status).cloned().collect();
        matching.sort_by_key(|j| j.created_at);
        Ok(matching)
    }

    async fn find_latest_child(&self, parent_id: Uuid) -> Result<Option<VideoJob>> {
        let jobs = self.jobs.read().await;
        Ok(jobs
            .iter()
            .enumerate()
            .filter(|(_, j)| j.parent_job_id == Some(parent_id))
            .max_by(|(ia, a), (ib, b)| a.created_at.cmp(&b.created_at).then(ia.cmp(ib)))
            .map(|(_, j)| j.clone()))
    }

    async fn claim(&self, id: Uuid) -> Result<Option<VideoJob>> {
        let mut jobs = self.jobs.write().await;
        match jobs.iter_mut().find(|j| j.id == id) {
            Some(job) if job.status == JobStatus::Queued => {
                job.status = JobStatus::Scripting;
                job.started_at = Some(chrono::Utc::now());
                Ok(Some(job.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn advance(&self, id: Uuid, status: JobStatus, progress: u8) -> Result<bool> {
        Ok(self
            .update_active(id, |job| {
                job.status = status;
                job.progress = job.progress.max(progress.min(100));
            })
            .await)
    }

    async fn update_progress(&self, id: Uuid, progress: u8) -> Result<()> {
        self.update_active(id, |job| job.progress = job.progress.max(progress.min(100)))
            .await;
        Ok(())
    }

    async fn record_artifacts(&self, id: Uuid, patch: ArtifactPatch) -> Result<()> {
        let mut jobs = self.jobs.write().await;
        if let Some(job) = jobs.iter_mut().find(|j| j.id == id) {
            patch.apply(job);
        }
        Ok(())
    }

    async fn increment_retry(&self, id: Uuid) -> Result<u32> {
        let mut jobs = self.jobs.write().await;
        let job = jobs
            .iter_mut()
            .find(|j| j.id == id)
            .ok_or(RepositoryError::NotFound(id))?;
        job.retry_count += 1;
        Ok(job.retry_count)
    }

    async fn record_render(&self, id: Uuid, mode: RenderMode, duration_seconds: f64) -> Result<()> {
        let mut jobs = self.jobs.write().await;
        if let Some(job) = jobs.iter_mut().find(|j| j.id == id) {
            job.render_mode = Some(mode);
            job.render_duration_seconds = Some(duration_seconds);
        }
        Ok(())
    }

    async fn complete(
        &self,
        id: Uuid,
        video_id: ArtifactId,
        thumbnail_id: Option<ArtifactId>,
    ) -> Result<bool> {
        Ok(self
            .update_active(id, |job| {
                job.status = JobStatus::Completed;
                job.progress = 100;
                if job.video_id.is_none() {
                    job.video_id = Some(video_id);
                }
                if job.thumbnail_id.is_none() {
                    job.thumbnail_id = thumbnail_id;
                }
                job.error = None;
                job.completed_at = Some(chrono::Utc::now());
            })
            .await)
    }

    async fn fail(&self, id: Uuid, error: &str) -> Result<bool> {
        Ok(self
            .update_active(id, |job| {
                job.status = JobStatus::Failed;
                job.error = Some(error.to_string());
                job.completed_at = Some(chrono::Utc::now());
            })
            .await)
    }

    async fn mark_cancelled(&self, id: Uuid) -> Result<bool> {
        Ok(self
            .update_active(id, |job| {
                job.status = JobStatus::Cancelled;
                job.error = Some(CANCELLED_MESSAGE.to_string());
                job.cancel_requested = true;
                job.completed_at = Some(chrono::Utc::now());
            })
            .await)
    }

    async fn request_cancel(&self, id: Uuid) -> Result<Option<CancelOutcome>> {
        let mut jobs = self.jobs.write().await;
        let Some(job) = jobs.iter_mut().find(|j| j.id == id) else {
            return Ok(None);
        };

        let outcome = match job.status {
            JobStatus::Queued => {
                job.status = JobStatus::Cancelled;
                job.error = Some(CANCELLED_MESSAGE.to_string());
                job.cancel_requested = true;
                job.completed_at = Some(chrono::Utc::now());
                CancelOutcome::Cancelled
            }
            status if status.is_terminal() => CancelOutcome::Terminal(status),
            status => {
                job.cancel_requested = true;
                CancelOutcome::Requested(status)
            }
        };
        Ok(Some(outcome))
    }

    async fn is_cancel_requested(&self, id: Uuid) -> Result<bool> {
        let jobs = self.jobs.read().await;
        Ok(jobs.iter().any(|j| j.id == id && j.cancel_requested))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reel_core::dto::job::GenerateOptions;

    fn new_job(creator: &str) -> NewJob {
        NewJob::fresh(creator.into(), "A prompt".into(), GenerateOptions::default())
    }

    #[tokio::test]
    async fn test_claim_is_exclusive() {
        let repo = InMemoryJobRepository::new();
        let job = repo.create(new_job("c")).await.unwrap();

        let first = repo.claim(job.id).await.unwrap();
        let second = repo.claim(job.id).await.unwrap();

        assert_eq!(first.map(|j| j.status), Some(JobStatus::Scripting));
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn test_terminal_jobs_are_frozen() {
        let repo = InMemoryJobRepository::new();
        let job = repo.create(new_job("c")).await.unwrap();
        repo.claim(job.id).await.unwrap();

        assert!(repo.fail(job.id, "narrating stage failed: boom").await.unwrap());
        assert!(!repo.advance(job.id, JobStatus::Rendering, 70).await.unwrap());
        assert!(!repo.complete(job.id, "video".into(), None).await.unwrap());
        repo.update_progress(job.id, 90).await.unwrap();

        let stored = repo.find_by_id(job.id).await.unwrap().unwrap();
        assert_eq!(stored.status, JobStatus::Failed);
        assert_eq!(stored.progress, 0);
        assert_eq!(stored.error.as_deref(), Some("narrating stage failed: boom"));
    }

    #[tokio::test]
    async fn test_progress_never_moves_backwards() {
        let repo = InMemoryJobRepository::new();
        let job = repo.create(new_job("c")).await.unwrap();
        repo.claim(job.id).await.unwrap();

        repo.update_progress(job.id, 40).await.unwrap();
        repo.update_progress(job.id, 25).await.unwrap();
        repo.advance(job.id, JobStatus::Narrating, 40).await.unwrap();

        let stored = repo.find_by_id(job.id).await.unwrap().unwrap();
        assert_eq!(stored.progress, 40);
        assert_eq!(stored.status, JobStatus::Narrating);
    }

    #[tokio::test]
    async fn test_request_cancel_per_state() {
        let repo = InMemoryJobRepository::new();
        let queued = repo.create(new_job("c")).await.unwrap();
        let running = repo.create(new_job("c")).await.unwrap();
        repo.claim(running.id).await.unwrap();

        assert_eq!(
            repo.request_cancel(queued.id).await.unwrap(),
            Some(CancelOutcome::Cancelled)
        );
        assert_eq!(
            repo.request_cancel(running.id).await.unwrap(),
            Some(CancelOutcome::Requested(JobStatus::Scripting))
        );
        assert!(repo.is_cancel_requested(running.id).await.unwrap());
        assert_eq!(
            repo.request_cancel(queued.id).await.unwrap(),
            Some(CancelOutcome::Terminal(JobStatus::Cancelled))
        );
        assert_eq!(repo.request_cancel(Uuid::new_v4()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_latest_child_prefers_last_created() {
        let repo = InMemoryJobRepository::new();
        let root = repo.create(new_job("c")).await.unwrap();
        let first = repo.create(NewJob::iteration(&root, "one")).await.unwrap();
        let second = repo.create(NewJob::iteration(&root, "two")).await.unwrap();

        assert_eq!(first.version, second.version);
        let latest = repo.find_latest_child(root.id).await.unwrap().unwrap();
        assert_eq!(latest.id, second.id);
        assert!(repo.find_latest_child(second.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_find_by_creator_is_newest_first_and_limited() {
        let repo = InMemoryJobRepository::new();
        let a = repo.create(new_job("alice")).await.unwrap();
        let b = repo.create(new_job("alice")).await.unwrap();
        repo.create(new_job("bob")).await.unwrap();

        let jobs = repo.find_by_creator("alice", 10).await.unwrap();
        assert_eq!(
            jobs.iter().map(|j| j.id).collect::<Vec<_>>(),
            vec![b.id, a.id]
        );
        assert_eq!(repo.find_by_creator("alice", 1).await.unwrap().len(), 1);
    }
}
