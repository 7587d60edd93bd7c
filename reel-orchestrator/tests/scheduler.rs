//! Background execution through the job scheduler

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::*;
use reel_core::domain::job::JobStatus;
use reel_core::dto::job::GenerateOptions;
use reel_orchestrator::repository::{JobRepository, NewJob, StaticCreatorDirectory};
use reel_orchestrator::scheduler::JobScheduler;
use reel_orchestrator::scheduler::worker::INTERRUPTED_MESSAGE;
use reel_orchestrator::service::VideoService;
use uuid::Uuid;

async fn wait_until_terminal(env: &TestEnv, id: Uuid) -> JobStatus {
    for _ in 0..500 {
        let job = env.jobs.find_by_id(id).await.unwrap().unwrap();
        if job.status.is_terminal() {
            return job.status;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job {} did not finish", id);
}

async fn scheduled_env(sweep: Duration) -> (TestEnv, VideoService) {
    let (_fake, stages) = FakeStages::default().into_stages();
    let env = TestEnv::new(stages, local_backend(Arc::new(FakeRenderer::default()))).await;

    let (scheduler, handle) = JobScheduler::new(env.pipeline.clone(), env.jobs.clone(), 2, sweep);
    tokio::spawn(scheduler.run());

    let service = VideoService::new(
        env.jobs.clone(),
        Arc::new(StaticCreatorDirectory::open()),
        env.artifacts.clone(),
        Arc::new(handle),
        50,
    );
    (env, service)
}

#[tokio::test]
async fn test_generate_returns_before_pipeline_finishes() {
    let (env, service) = scheduled_env(Duration::from_secs(3600)).await;

    let mut ids = Vec::new();
    for n in 0..4 {
        let created = service
            .generate(generate_request(&format!("video {}", n)))
            .await
            .unwrap();
        ids.push(created.job_id);
    }

    for id in ids {
        assert_eq!(wait_until_terminal(&env, id).await, JobStatus::Completed);
    }
}

#[tokio::test]
async fn test_sweep_picks_up_undispatched_jobs() {
    let (env, _service) = scheduled_env(Duration::from_millis(50)).await;

    // Inserted straight into the store, never dispatched
    let job = env
        .jobs
        .create(NewJob::fresh(
            CREATOR.to_string(),
            "p".to_string(),
            GenerateOptions::default(),
        ))
        .await
        .unwrap();

    assert_eq!(wait_until_terminal(&env, job.id).await, JobStatus::Completed);
}

#[tokio::test]
async fn test_startup_fails_jobs_left_running() {
    let (_fake, stages) = FakeStages::default().into_stages();
    let env = TestEnv::new(stages, local_backend(Arc::new(FakeRenderer::default()))).await;

    let stranded = env
        .jobs
        .create(NewJob::fresh(
            CREATOR.to_string(),
            "p".to_string(),
            GenerateOptions::default(),
        ))
        .await
        .unwrap();
    env.jobs.claim(stranded.id).await.unwrap();
    env.jobs
        .advance(stranded.id, JobStatus::Narrating, 40)
        .await
        .unwrap();

    let (scheduler, _handle) = JobScheduler::new(
        env.pipeline.clone(),
        env.jobs.clone(),
        1,
        Duration::from_secs(3600),
    );
    tokio::spawn(scheduler.run());

    assert_eq!(wait_until_terminal(&env, stranded.id).await, JobStatus::Failed);
    let job = env.jobs.find_by_id(stranded.id).await.unwrap().unwrap();
    assert_eq!(job.error.as_deref(), Some(INTERRUPTED_MESSAGE));
    assert_eq!(job.progress, 40);
}
