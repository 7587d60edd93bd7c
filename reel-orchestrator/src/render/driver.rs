//! Shared render loop

use super::{RenderBackend, RenderError, RenderObserver};
use crate::artifact::ArtifactStore;
use reel_core::domain::artifact::ArtifactId;
use reel_core::domain::render::{RenderContract, RenderMode, RenderSpec};

/// A finished render stored in the artifact store
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedVideo {
    pub video_id: ArtifactId,
    pub mode: RenderMode,
    pub contract: RenderContract,
    pub size_bytes: usize,
}

/// Renders `spec` on `backend` and uploads the result.
///
/// Cancellation is checked before submitting and before every poll. The
/// poll budget of the backend is enforced here; exceeding it is an error.
/// A transient poll failure uses up a poll like any other.
/// The render handle, and any scratch space it owns, is released before
/// this returns.
pub async fn render_to_artifact(
    backend: &dyn RenderBackend,
    store: &dyn ArtifactStore,
    spec: &RenderSpec,
    observer: &dyn RenderObserver,
) -> Result<RenderedVideo, RenderError> {
    if observer.is_cancelled().await {
        return Err(RenderError::Cancelled);
    }

    let mut handle = backend.submit(spec).await?;
    let policy = backend.poll_policy();
    tracing::info!(
        render_id = %handle.render_id,
        mode = %backend.mode(),
        frames = spec.total_frames,
        "Render submitted"
    );

    let mut polls = 0u32;
    loop {
        if observer.is_cancelled().await {
            tracing::info!(render_id = %handle.render_id, "Render cancelled");
            return Err(RenderError::Cancelled);
        }
        if polls >= policy.max_polls {
            return Err(RenderError::TimedOut { polls });
        }
        polls += 1;

        let status = match backend.poll(&mut handle, observer).await {
            Ok(status) => status,
            Err(e) if e.is_transient() => {
                tracing::warn!(
                    render_id = %handle.render_id,
                    poll = polls,
                    error = %e,
                    "Render poll failed, will poll again"
                );
                tokio::time::sleep(policy.interval).await;
                continue;
            }
            Err(e) => return Err(e),
        };
        observer.on_progress(status.progress).await;
        tracing::debug!(
            render_id = %handle.render_id,
            poll = polls,
            progress = status.progress,
            "Render poll"
        );

        if status.done {
            break;
        }
        tokio::time::sleep(policy.interval).await;
    }

    let bytes = backend.fetch_output(&handle).await?;
    if bytes.is_empty() {
        return Err(RenderError::EmptyOutput);
    }

    let size_bytes = bytes.len();
    let video_id = store.put(bytes, "video/mp4").await?;
    tracing::info!(
        render_id = %handle.render_id,
        video = %video_id,
        size_bytes,
        "Render stored"
    );

    Ok(RenderedVideo {
        video_id,
        mode: backend.mode(),
        contract: spec.contract(),
        size_bytes,
    })
}
