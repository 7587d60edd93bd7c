//! Scheduler layer for the orchestrator
//!
//! Accepted jobs are handed to the scheduler by id. A dispatcher loop runs
//! each one on its own task, bounded by a semaphore, and periodically sweeps
//! the job store for queued jobs whose dispatch was lost (e.g. across a
//! restart).

pub mod worker;

pub use worker::{JobScheduler, SchedulerHandle};

use uuid::Uuid;

/// Hands accepted jobs over for background execution
pub trait Dispatcher: Send + Sync {
    fn dispatch(&self, job_id: Uuid);
}

/// Dispatcher that drops every job; the periodic sweep still finds them.
pub struct NoopDispatcher;

impl Dispatcher for NoopDispatcher {
    fn dispatch(&self, job_id: Uuid) {
        tracing::debug!(job_id = %job_id, "Dispatch skipped");
    }
}
