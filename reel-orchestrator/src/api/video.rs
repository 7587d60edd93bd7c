//! Video API Handlers
//!
//! HTTP endpoints for generating, iterating, cancelling and reading video
//! jobs. Handlers only translate between HTTP and `VideoService`.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use reel_core::dto::job::{
    CancelAccepted, GenerateVideo, IterateVideo, JobCreated, JobDetails, JobProgress, JobSummary,
    VersionEntry,
};
use serde::Deserialize;
use uuid::Uuid;

use super::AppState;
use crate::api::error::ApiResult;

// =============================================================================
// Job Creation Endpoints
// =============================================================================

/// POST /videos
pub async fn generate_video(
    State(state): State<AppState>,
    Json(req): Json<GenerateVideo>,
) -> ApiResult<(StatusCode, Json<JobCreated>)> {
    tracing::info!("Generate request from creator: {}", req.creator_id);

    let created = state.service.generate(req).await?;
    Ok((StatusCode::ACCEPTED, Json(created)))
}

/// POST /videos/{id}/iterate
pub async fn iterate_video(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<IterateVideo>,
) -> ApiResult<(StatusCode, Json<JobCreated>)> {
    tracing::info!("Iterate request for job: {}", id);

    let created = state.service.iterate(id, req).await?;
    Ok((StatusCode::ACCEPTED, Json(created)))
}

/// POST /videos/{id}/cancel
pub async fn cancel_video(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<(StatusCode, Json<CancelAccepted>)> {
    tracing::info!("Cancel request for job: {}", id);

    let accepted = state.service.cancel(id).await?;
    Ok((StatusCode::ACCEPTED, Json(accepted)))
}

// =============================================================================
// Query Endpoints
// =============================================================================

/// GET /videos/{id}
pub async fn get_video(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<JobDetails>> {
    tracing::debug!("Getting job: {}", id);
    Ok(Json(state.service.get_job(id).await?))
}

/// GET /videos/{id}/progress
pub async fn get_progress(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<JobProgress>> {
    Ok(Json(state.service.get_progress(id).await?))
}

/// GET /videos/{id}/history
pub async fn get_history(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Vec<VersionEntry>>> {
    tracing::debug!("Getting version history for job: {}", id);
    Ok(Json(state.service.get_version_history(id).await?))
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub limit: Option<u32>,
}

/// GET /creators/{creator_id}/videos
pub async fn list_creator_videos(
    State(state): State<AppState>,
    Path(creator_id): Path<String>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<JobSummary>>> {
    tracing::debug!("Listing jobs for creator: {}", creator_id);
    Ok(Json(state.service.list_jobs(&creator_id, query.limit).await?))
}
