//! API Module
//!
//! HTTP API layer for the orchestrator.

pub mod error;
pub mod health;
pub mod video;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::service::VideoService;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<VideoService>,
}

/// Create the main API router with all endpoints
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Job creation
        .route("/videos", post(video::generate_video))
        .route("/videos/{id}/iterate", post(video::iterate_video))
        .route("/videos/{id}/cancel", post(video::cancel_video))
        // Queries
        .route("/videos/{id}", get(video::get_video))
        .route("/videos/{id}/progress", get(video::get_progress))
        .route("/videos/{id}/history", get(video::get_history))
        .route(
            "/creators/{creator_id}/videos",
            get(video::list_creator_videos),
        )
        // Add state and middleware
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
