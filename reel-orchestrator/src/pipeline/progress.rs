use crate::render::RenderObserver;
use crate::repository::JobRepository;
use async_trait::async_trait;
use reel_core::domain::progress::{ProgressWindow, decile};
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use uuid::Uuid;

/// Writes render progress to the job, at most once per tenth of the render.
pub struct RenderProgressReporter {
    jobs: Arc<dyn JobRepository>,
    job_id: Uuid,
    window: ProgressWindow,
    last_decile: AtomicU8,
}

impl RenderProgressReporter {
    pub fn new(jobs: Arc<dyn JobRepository>, job_id: Uuid, window: ProgressWindow) -> Self {
        Self {
            jobs,
            job_id,
            window,
            last_decile: AtomicU8::new(0),
        }
    }
}

#[async_trait]
impl RenderObserver for RenderProgressReporter {
    async fn on_progress(&self, fraction: f64) {
        let reached = decile(fraction);
        let previous = self.last_decile.fetch_max(reached, Ordering::SeqCst);
        if reached <= previous {
            return;
        }

        let progress = self.window.at(fraction);
        tracing::debug!(job_id = %self.job_id, progress, "Render progress");
        if let Err(e) = self.jobs.update_progress(self.job_id, progress).await {
            tracing::warn!(job_id = %self.job_id, "Failed to record render progress: {}", e);
        }
    }

    async fn is_cancelled(&self) -> bool {
        match self.jobs.is_cancel_requested(self.job_id).await {
            Ok(cancelled) => cancelled,
            Err(e) => {
                tracing::warn!(job_id = %self.job_id, "Cancellation check failed: {}", e);
                false
            }
        }
    }
}
