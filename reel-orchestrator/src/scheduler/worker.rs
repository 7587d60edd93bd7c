//! Job scheduler
//!
//! Receives job ids over a bounded queue and runs each job's pipeline in its
//! own task. At most `max_parallel_jobs` pipelines run at once.

use super::Dispatcher;
use crate::pipeline::Pipeline;
use crate::repository::JobRepository;
use reel_core::domain::job::JobStatus;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tokio::sync::{Semaphore, mpsc};
use tokio::time::{self, Duration};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Dispatches waiting in the queue before new ones are left to the sweep.
const QUEUE_CAPACITY: usize = 1024;

/// Error recorded on jobs left running by a previous orchestrator process.
pub const INTERRUPTED_MESSAGE: &str = "interrupted by orchestrator restart";

/// Cloneable sender side of the scheduler queue
#[derive(Clone)]
pub struct SchedulerHandle {
    sender: mpsc::Sender<Uuid>,
}

impl Dispatcher for SchedulerHandle {
    fn dispatch(&self, job_id: Uuid) {
        match self.sender.try_send(job_id) {
            Ok(()) => debug!(job_id = %job_id, "Job dispatched"),
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(job_id = %job_id, "Scheduler queue full, job left for the next sweep")
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                error!(job_id = %job_id, "Scheduler stopped, job left queued")
            }
        }
    }
}

pub struct JobScheduler {
    pipeline: Arc<Pipeline>,
    jobs: Arc<dyn JobRepository>,
    receiver: mpsc::Receiver<Uuid>,
    semaphore: Arc<Semaphore>,
    in_flight: Arc<Mutex<HashSet<Uuid>>>,
    sweep_interval: Duration,
}

impl JobScheduler {
    /// Creates a scheduler and the handle used to feed it
    pub fn new(
        pipeline: Arc<Pipeline>,
        jobs: Arc<dyn JobRepository>,
        max_parallel_jobs: usize,
        sweep_interval: Duration,
    ) -> (Self, SchedulerHandle) {
        let (sender, receiver) = mpsc::channel(QUEUE_CAPACITY);
        let scheduler = Self {
            pipeline,
            jobs,
            receiver,
            semaphore: Arc::new(Semaphore::new(max_parallel_jobs)),
            in_flight: Arc::new(Mutex::new(HashSet::new())),
            sweep_interval,
        };
        (scheduler, SchedulerHandle { sender })
    }

    /// Runs the dispatcher loop until every handle is dropped
    pub async fn run(mut self) {
        info!(
            "Starting job scheduler (sweep interval: {:?})",
            self.sweep_interval
        );
        self.recover_interrupted().await;

        // The first tick fires immediately and picks up the backlog
        let mut sweep = time::interval(self.sweep_interval);

        loop {
            tokio::select! {
                received = self.receiver.recv() => match received {
                    Some(job_id) => self.start(job_id).await,
                    None => {
                        info!("Scheduler queue closed, stopping");
                        break;
                    }
                },
                _ = sweep.tick() => self.sweep().await,
            }
        }
    }

    /// Fails jobs a previous process left mid-pipeline
    async fn recover_interrupted(&self) {
        for status in [
            JobStatus::Scripting,
            JobStatus::Imaging,
            JobStatus::Narrating,
            JobStatus::GeneratingCode,
            JobStatus::Rendering,
        ] {
            let stranded = match self.jobs.find_by_status(status).await {
                Ok(jobs) => jobs,
                Err(e) => {
                    error!("Failed to look up {} jobs: {}", status, e);
                    continue;
                }
            };
            for job in stranded {
                warn!(job_id = %job.id, status = %status, "Failing interrupted job");
                if let Err(e) = self.jobs.fail(job.id, INTERRUPTED_MESSAGE).await {
                    error!(job_id = %job.id, "Failed to record interruption: {}", e);
                }
            }
        }
    }

    async fn sweep(&self) {
        let queued = match self.jobs.find_by_status(JobStatus::Queued).await {
            Ok(jobs) => jobs,
            Err(e) => {
                error!("Sweep for queued jobs failed: {}", e);
                return;
            }
        };

        if !queued.is_empty() {
            debug!("Sweep found {} queued job(s)", queued.len());
        }
        for job in queued {
            self.start(job.id).await;
        }
    }

    /// Waits for a free slot and spawns the job's pipeline
    async fn start(&self, job_id: Uuid) {
        if !self.mark_in_flight(job_id) {
            debug!(job_id = %job_id, "Job already running, skipping dispatch");
            return;
        }

        let permit = match self.semaphore.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => {
                error!("Scheduler semaphore closed");
                return;
            }
        };

        let pipeline = Arc::clone(&self.pipeline);
        let jobs = Arc::clone(&self.jobs);
        let in_flight = Arc::clone(&self.in_flight);

        let task = tokio::spawn(async move { pipeline.run(job_id).await });

        // Supervisor: a panicking pipeline still ends its job
        tokio::spawn(async move {
            if let Err(e) = task.await {
                warn!(job_id = %job_id, "Job task panicked: {}", e);
                if let Err(e) = jobs.fail(job_id, "pipeline task panicked").await {
                    error!(job_id = %job_id, "Failed to record panic: {}", e);
                }
            }
            in_flight
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .remove(&job_id);
            drop(permit);
        });
    }

    fn mark_in_flight(&self, job_id: Uuid) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(job_id)
    }
}
