//! Local render backend
//!
//! Renders on the orchestrator host. Each render gets a scratch directory
//! holding the composition bundle and the output file; the directory lives
//! inside the render handle and disappears with it.
//!
//! The renderer program is invoked as
//! `<bin> --composition <file> --props <file> --output <file>` plus the
//! frame geometry, and reports progress on stdout, one report per line.

use super::{
    OutputLocation, PollPolicy, RenderBackend, RenderError, RenderHandle, RenderObserver,
    RenderStatus,
};
use async_trait::async_trait;
use reel_core::domain::render::{RenderMode, RenderSpec};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;

const COMPOSITION_FILE: &str = "composition.js";
const PROPS_FILE: &str = "props.json";
const OUTPUT_FILE: &str = "output.mp4";

/// How often a running local render checks for cancellation.
const CANCEL_CHECK_INTERVAL: Duration = Duration::from_millis(250);

/// Files of one local render
#[derive(Debug)]
pub struct LocalRenderJob<'a> {
    pub spec: &'a RenderSpec,
    pub composition: PathBuf,
    pub props: PathBuf,
    pub output: PathBuf,
}

impl<'a> LocalRenderJob<'a> {
    fn new(spec: &'a RenderSpec, dir: &Path) -> Self {
        Self {
            spec,
            composition: dir.join(COMPOSITION_FILE),
            props: dir.join(PROPS_FILE),
            output: dir.join(OUTPUT_FILE),
        }
    }
}

/// Turns a composition bundle into a video file
#[async_trait]
pub trait CompositionRenderer: Send + Sync {
    async fn render(
        &self,
        job: &LocalRenderJob<'_>,
        observer: &dyn RenderObserver,
    ) -> Result<(), RenderError>;
}

pub struct LocalRenderBackend {
    renderer: Arc<dyn CompositionRenderer>,
    timeout: Duration,
}

impl LocalRenderBackend {
    pub fn new(renderer: Arc<dyn CompositionRenderer>, timeout: Duration) -> Self {
        Self { renderer, timeout }
    }
}

#[async_trait]
impl RenderBackend for LocalRenderBackend {
    fn mode(&self) -> RenderMode {
        RenderMode::Local
    }

    /// One blocking poll runs the whole render
    fn poll_policy(&self) -> PollPolicy {
        PollPolicy {
            interval: Duration::ZERO,
            max_polls: 1,
        }
    }

    async fn submit(&self, spec: &RenderSpec) -> Result<RenderHandle, RenderError> {
        let dir = tempfile::Builder::new().prefix("reel-render-").tempdir()?;
        let job = LocalRenderJob::new(spec, dir.path());

        let props = json!({
            "imageUrls": spec.image_urls,
            "audioUrl": spec.audio_url,
            "totalFrames": spec.total_frames,
            "fps": spec.fps,
            "width": spec.width,
            "height": spec.height,
        });
        tokio::fs::write(&job.composition, &spec.code).await?;
        tokio::fs::write(&job.props, props.to_string()).await?;

        let render_id = dir
            .path()
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        tracing::debug!(render_id = %render_id, path = %dir.path().display(), "Prepared local render bundle");

        Ok(RenderHandle::scratch(render_id, dir, spec.clone()))
    }

    async fn poll(
        &self,
        handle: &mut RenderHandle,
        observer: &dyn RenderObserver,
    ) -> Result<RenderStatus, RenderError> {
        if let Some(OutputLocation::File(_)) = handle.output {
            return Ok(RenderStatus {
                progress: 1.0,
                done: true,
            });
        }

        let dir = handle
            .scratch_path()
            .ok_or(RenderError::MissingOutput)?
            .to_path_buf();
        let spec = handle.spec.clone().ok_or(RenderError::MissingOutput)?;
        let job = LocalRenderJob::new(&spec, &dir);

        let cancelled = async {
            loop {
                tokio::time::sleep(CANCEL_CHECK_INTERVAL).await;
                if observer.is_cancelled().await {
                    break;
                }
            }
        };

        tokio::select! {
            result = tokio::time::timeout(self.timeout, self.renderer.render(&job, observer)) => {
                match result {
                    Ok(rendered) => rendered?,
                    Err(_) => return Err(RenderError::DeadlineExceeded(self.timeout)),
                }
            }
            _ = cancelled => return Err(RenderError::Cancelled),
        }

        if !tokio::fs::try_exists(&job.output).await? {
            return Err(RenderError::MissingOutput);
        }
        handle.output = Some(OutputLocation::File(job.output.clone()));

        Ok(RenderStatus {
            progress: 1.0,
            done: true,
        })
    }

    async fn fetch_output(&self, handle: &RenderHandle) -> Result<Vec<u8>, RenderError> {
        match &handle.output {
            Some(OutputLocation::File(path)) => Ok(tokio::fs::read(path).await?),
            _ => Err(RenderError::MissingOutput),
        }
    }
}

/// Runs an external renderer program.
///
/// The command line may carry leading arguments, e.g. `npx remotion-render`.
pub struct CommandRenderer {
    program: String,
    args: Vec<String>,
}

impl CommandRenderer {
    pub fn new(command_line: impl AsRef<str>) -> Self {
        let mut parts = command_line.as_ref().split_whitespace().map(str::to_string);
        Self {
            program: parts.next().unwrap_or_default(),
            args: parts.collect(),
        }
    }
}

#[async_trait]
impl CompositionRenderer for CommandRenderer {
    async fn render(
        &self,
        job: &LocalRenderJob<'_>,
        observer: &dyn RenderObserver,
    ) -> Result<(), RenderError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .arg("--composition")
            .arg(&job.composition)
            .arg("--props")
            .arg(&job.props)
            .arg("--output")
            .arg(&job.output)
            .arg("--frames")
            .arg(job.spec.total_frames.to_string())
            .arg("--fps")
            .arg(job.spec.fps.to_string())
            .arg("--width")
            .arg(job.spec.width.to_string())
            .arg("--height")
            .arg(job.spec.height.to_string())
            .arg("--codec")
            .arg(&job.spec.codec)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| RenderError::Renderer(format!("cannot start '{}': {}", self.program, e)))?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let progress = async {
            if let Some(stdout) = stdout {
                let mut lines = BufReader::new(stdout).lines();
                while let Some(line) = lines.next_line().await? {
                    match parse_progress_line(&line) {
                        Some(fraction) => observer.on_progress(fraction).await,
                        None => tracing::trace!(line = %line, "renderer output"),
                    }
                }
            }
            Ok::<_, std::io::Error>(())
        };
        let diagnostics = async {
            let mut text = String::new();
            if let Some(mut stderr) = stderr {
                if let Err(e) = stderr.read_to_string(&mut text).await {
                    tracing::warn!(error = %e, "Could not read renderer stderr");
                }
            }
            text
        };

        let (progress, diagnostics) = tokio::join!(progress, diagnostics);
        progress?;
        let status = child.wait().await?;

        if !status.success() {
            let reason = diagnostics
                .lines()
                .rev()
                .find(|l| !l.trim().is_empty())
                .unwrap_or("no diagnostics")
                .trim()
                .to_string();
            return Err(RenderError::Renderer(format!("{} ({})", reason, status)));
        }
        Ok(())
    }
}

/// Reads a progress report from one line of renderer output.
///
/// Understands `progress: 0.42`, `progress=42%` and `Rendered 120/1800`.
pub fn parse_progress_line(line: &str) -> Option<f64> {
    let line = line.trim().to_ascii_lowercase();

    if let Some(rest) = line.strip_prefix("progress") {
        let value = rest.trim_start_matches([':', '=', ' ']);
        let fraction = match value.strip_suffix('%') {
            Some(percent) => percent.trim().parse::<f64>().ok()? / 100.0,
            None => value.parse::<f64>().ok()?,
        };
        return fraction.is_finite().then(|| fraction.clamp(0.0, 1.0));
    }

    if let Some(rest) = line.strip_prefix("rendered") {
        let (done, total) = rest.trim().split_once('/')?;
        let done: f64 = done.trim().parse().ok()?;
        let total: f64 = total.split_whitespace().next()?.parse().ok()?;
        if total > 0.0 {
            return Some((done / total).clamp(0.0, 1.0));
        }
    }

    None
}
