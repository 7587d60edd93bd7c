//! Artifact storage
//!
//! Blobs produced by the pipeline (scripts, images, narration, composition
//! code, videos) live outside the job store. Jobs only carry the opaque ids
//! returned here; URLs are resolved on read and may be short-lived.

mod fs;
mod http;

pub use fs::FsArtifactStore;
pub use http::HttpArtifactStore;

use crate::config::Config;
use async_trait::async_trait;
use reel_core::domain::artifact::ArtifactId;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("artifact I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("artifact request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("artifact store rejected request (status {status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("invalid artifact id '{0}'")]
    InvalidId(String),
}

#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Stores a blob and returns its id
    async fn put(&self, bytes: Vec<u8>, content_type: &str) -> Result<ArtifactId, ArtifactError>;

    /// Resolves an id to a fetchable URL, `None` if the blob is gone
    async fn url(&self, id: &ArtifactId) -> Result<Option<String>, ArtifactError>;
}

/// Opens the store selected by the configuration.
///
/// A configured `artifact_url` wins; otherwise blobs go to `artifact_dir`,
/// served from `artifact_public_url` when one is set.
pub async fn open(config: &Config) -> Result<Arc<dyn ArtifactStore>, ArtifactError> {
    if let Some(url) = &config.artifact_url {
        tracing::info!("Using artifact store at {}", url);
        return Ok(Arc::new(HttpArtifactStore::new(
            url.clone(),
            config.remote_request_timeout,
        )));
    }

    let mut store = FsArtifactStore::open(config.artifact_dir.clone()).await?;
    if let Some(public_url) = &config.artifact_public_url {
        store = store.with_public_base(public_url.clone());
    }
    tracing::info!("Storing artifacts under {}", store.root().display());
    Ok(Arc::new(store))
}

/// File extension used for a stored content type.
pub(crate) fn extension_for(content_type: &str) -> &'static str {
    match content_type.split(';').next().unwrap_or_default().trim() {
        "video/mp4" => "mp4",
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "image/webp" => "webp",
        "audio/mpeg" => "mp3",
        "audio/wav" | "audio/x-wav" => "wav",
        "application/json" => "json",
        "text/javascript" | "application/javascript" => "js",
        "text/plain" => "txt",
        _ => "bin",
    }
}
