//! Render backends
//!
//! Turning a composition into a video file takes minutes, so rendering is
//! modelled as submit, poll until done, then fetch. The distributed backend
//! maps this onto a remote render farm; the local backend runs a renderer
//! process in a scratch directory. `driver::render_to_artifact` runs the
//! loop for either one.

pub mod distributed;
pub mod driver;
pub mod local;

pub use distributed::DistributedRenderBackend;
pub use driver::{RenderedVideo, render_to_artifact};
pub use local::{CommandRenderer, CompositionRenderer, LocalRenderBackend};

use crate::artifact::ArtifactError;
use crate::config::Config;
use async_trait::async_trait;
use reel_core::domain::render::{RenderMode, RenderSpec};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("render submission failed: {0}")]
    Submit(String),

    #[error("render failed: {0}")]
    Fatal(String),

    #[error("render timed out after {polls} polls")]
    TimedOut { polls: u32 },

    #[error("local render exceeded {0:?}")]
    DeadlineExceeded(Duration),

    #[error("render cancelled")]
    Cancelled,

    #[error("render farm request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("render farm unavailable: {0}")]
    Unavailable(String),

    #[error("render I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("storing rendered video failed: {0}")]
    Artifact(#[from] ArtifactError),

    #[error("renderer exited with error: {0}")]
    Renderer(String),

    #[error("render finished without an output file")]
    MissingOutput,

    #[error("render produced an empty file")]
    EmptyOutput,
}

impl RenderError {
    /// Poll failures the driver absorbs as a poll without progress
    pub fn is_transient(&self) -> bool {
        matches!(self, RenderError::Unavailable(_))
    }
}

/// Where a finished render left its file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputLocation {
    Remote(String),
    File(PathBuf),
}

/// An in-flight render.
///
/// Local renders own their scratch directory here; it is deleted when the
/// handle is dropped, whichever way the render ends.
#[derive(Debug)]
pub struct RenderHandle {
    pub render_id: String,
    pub bucket: Option<String>,
    pub output: Option<OutputLocation>,
    pub(crate) scratch: Option<TempDir>,
    pub(crate) spec: Option<RenderSpec>,
}

impl RenderHandle {
    pub fn remote(render_id: String, bucket: String) -> Self {
        Self {
            render_id,
            bucket: Some(bucket),
            output: None,
            scratch: None,
            spec: None,
        }
    }

    pub(crate) fn scratch(render_id: String, dir: TempDir, spec: RenderSpec) -> Self {
        Self {
            render_id,
            bucket: None,
            output: None,
            scratch: Some(dir),
            spec: Some(spec),
        }
    }

    pub fn scratch_path(&self) -> Option<&std::path::Path> {
        self.scratch.as_ref().map(|d| d.path())
    }
}

/// Snapshot returned by one poll
#[derive(Debug, Clone, PartialEq)]
pub struct RenderStatus {
    /// Completion fraction in `[0, 1]`
    pub progress: f64,
    pub done: bool,
}

/// How the driver polls a backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_polls: u32,
}

/// Receives render progress and answers cancellation checks
#[async_trait]
pub trait RenderObserver: Send + Sync {
    async fn on_progress(&self, fraction: f64);

    async fn is_cancelled(&self) -> bool;
}

#[async_trait]
pub trait RenderBackend: Send + Sync {
    fn mode(&self) -> RenderMode;

    fn poll_policy(&self) -> PollPolicy;

    async fn submit(&self, spec: &RenderSpec) -> Result<RenderHandle, RenderError>;

    /// Checks on a render, recording its output location once done
    async fn poll(
        &self,
        handle: &mut RenderHandle,
        observer: &dyn RenderObserver,
    ) -> Result<RenderStatus, RenderError>;

    async fn fetch_output(&self, handle: &RenderHandle) -> Result<Vec<u8>, RenderError>;
}

/// Builds the backend selected by the configuration
pub fn select_backend(config: &Config) -> Arc<dyn RenderBackend> {
    match (
        config.render_mode(),
        config.render_farm_url.as_deref(),
        config.render_function.as_deref(),
    ) {
        (RenderMode::Distributed, Some(farm_url), Some(function)) => {
            Arc::new(
                DistributedRenderBackend::new(
                    farm_url,
                    function,
                    PollPolicy {
                        interval: config.render_poll_interval,
                        max_polls: config.render_max_polls,
                    },
                )
                .with_request_timeout(config.remote_request_timeout),
            )
        }
        _ => Arc::new(LocalRenderBackend::new(
            Arc::new(CommandRenderer::new(config.renderer_bin.clone())),
            config.local_render_timeout,
        )),
    }
}
