//! HTTP API over a real listener

mod common;

use std::sync::Arc;

use common::*;
use reel_core::domain::job::JobStatus;
use reel_core::dto::job::{CancelAccepted, JobCreated, JobDetails, JobProgress, JobSummary, VersionEntry};
use reel_orchestrator::api::{AppState, create_router};
use reel_orchestrator::repository::{Creator, StaticCreatorDirectory};
use reel_orchestrator::scheduler::NoopDispatcher;
use reel_orchestrator::service::VideoService;
use reqwest::StatusCode;
use serde_json::{Value, json};

async fn serve(env: &TestEnv) -> String {
    let creators = StaticCreatorDirectory::with_creators([Creator {
        id: CREATOR.to_string(),
        default_store_id: Some("store-1".to_string()),
    }]);
    let service = VideoService::new(
        env.jobs.clone(),
        Arc::new(creators),
        env.artifacts.clone(),
        Arc::new(NoopDispatcher),
        50,
    );
    let app = create_router(AppState {
        service: Arc::new(service),
    });

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
    base
}

async fn api_env() -> (TestEnv, String) {
    let (_fake, stages) = FakeStages::default().into_stages();
    let env = TestEnv::new(stages, local_backend(Arc::new(FakeRenderer::default()))).await;
    let base = serve(&env).await;
    (env, base)
}

#[tokio::test]
async fn test_health() {
    let (_env, base) = api_env().await;
    let resp = reqwest::get(format!("{}/health", base)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.text().await.unwrap(), "OK");
}

#[tokio::test]
async fn test_generate_run_and_read_back() {
    let (env, base) = api_env().await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/videos", base))
        .json(&json!({"creator_id": CREATOR, "prompt": "Explain DNS", "aspect_ratio": "16:9"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::ACCEPTED);
    let created: JobCreated = resp.json().await.unwrap();

    let progress: JobProgress = client
        .get(format!("{}/videos/{}/progress", base, created.job_id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(progress.status, JobStatus::Queued);
    assert_eq!(progress.progress, 0);

    env.pipeline.run(created.job_id).await;

    let details: JobDetails = client
        .get(format!("{}/videos/{}", base, created.job_id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(details.job.status, JobStatus::Completed);
    assert_eq!(details.job.aspect_ratio, "16:9");
    assert_eq!(details.job.store_id.as_deref(), Some("store-1"));
    assert_eq!(details.image_urls.len(), 2);
    assert!(details.audio_url.is_some());
    assert!(details.video_url.is_some());

    let listed: Vec<JobSummary> = client
        .get(format!("{}/creators/{}/videos?limit=10", base, CREATOR))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, created.job_id);
}

#[tokio::test]
async fn test_iterate_and_history() {
    let (_env, base) = api_env().await;
    let client = reqwest::Client::new();

    let parent: JobCreated = client
        .post(format!("{}/videos", base))
        .json(&json!({"creator_id": CREATOR, "prompt": "Explain DNS"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let resp = client
        .post(format!("{}/videos/{}/iterate", base, parent.job_id))
        .json(&json!({"creator_id": CREATOR, "feedback": "add a diagram"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::ACCEPTED);
    let child: JobCreated = resp.json().await.unwrap();

    let history: Vec<VersionEntry> = client
        .get(format!("{}/videos/{}/history", base, child.job_id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].id, parent.job_id);
    assert_eq!(history[1].id, child.job_id);
    assert_eq!(history[1].version, 2);
}

#[tokio::test]
async fn test_cancel_endpoint() {
    let (_env, base) = api_env().await;
    let client = reqwest::Client::new();

    let created: JobCreated = client
        .post(format!("{}/videos", base))
        .json(&json!({"creator_id": CREATOR, "prompt": "p"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let resp = client
        .post(format!("{}/videos/{}/cancel", base, created.job_id))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::ACCEPTED);
    let accepted: CancelAccepted = resp.json().await.unwrap();
    assert_eq!(accepted.status, JobStatus::Cancelled);

    let again = client
        .post(format!("{}/videos/{}/cancel", base, created.job_id))
        .send()
        .await
        .unwrap();
    assert_eq!(again.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_error_statuses_and_bodies() {
    let (_env, base) = api_env().await;
    let client = reqwest::Client::new();

    let empty = client
        .post(format!("{}/videos", base))
        .json(&json!({"creator_id": CREATOR, "prompt": ""}))
        .send()
        .await
        .unwrap();
    assert_eq!(empty.status(), StatusCode::BAD_REQUEST);
    let body: Value = empty.json().await.unwrap();
    assert_eq!(body["error"], "prompt must not be empty");

    let stranger = client
        .post(format!("{}/videos", base))
        .json(&json!({"creator_id": "stranger", "prompt": "p"}))
        .send()
        .await
        .unwrap();
    assert_eq!(stranger.status(), StatusCode::FORBIDDEN);

    let missing_id = uuid::Uuid::new_v4();
    let missing = client
        .get(format!("{}/videos/{}/progress", base, missing_id))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    let body: Value = missing.json().await.unwrap();
    assert_eq!(body["error"], format!("video job {} not found", missing_id));

    let orphan = client
        .post(format!("{}/videos/{}/iterate", base, missing_id))
        .json(&json!({"creator_id": CREATOR, "feedback": "more"}))
        .send()
        .await
        .unwrap();
    assert_eq!(orphan.status(), StatusCode::NOT_FOUND);
}
