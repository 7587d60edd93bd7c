//! Video job domain types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::artifact::ArtifactId;
use crate::domain::progress::ProgressWindow;
use crate::domain::render::RenderMode;

pub const DEFAULT_STYLE: &str = "modern";
pub const DEFAULT_DURATION_SECONDS: u32 = 60;
pub const DEFAULT_ASPECT_RATIO: &str = "9:16";

/// Separator placed between a parent prompt and the feedback of an iteration.
pub const ITERATION_SEPARATOR: &str = "\n\nIteration feedback: ";

/// Error recorded on a job stopped by a cancellation request.
pub const CANCELLED_MESSAGE: &str = "cancelled by request";

/// One request to produce a video from a prompt.
///
/// Structure shared between orchestrator (persists) and clients (read).
/// Artifact id fields are append-only: once a stage sets one it is never
/// cleared or replaced for the lifetime of the job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoJob {
    pub id: Uuid,
    pub creator_id: String,
    pub course_id: Option<String>,
    pub product_id: Option<String>,
    pub store_id: Option<String>,

    pub prompt: String,
    pub style: String,
    pub target_duration_seconds: u32,
    pub aspect_ratio: String,
    pub voice_id: Option<String>,

    pub status: JobStatus,
    pub progress: u8,
    pub error: Option<String>,

    pub script_id: Option<ArtifactId>,
    pub image_ids: Vec<ArtifactId>,
    pub audio_id: Option<ArtifactId>,
    pub audio_duration_seconds: Option<f64>,
    pub code_id: Option<ArtifactId>,
    pub generated_code: Option<String>,
    pub video_id: Option<ArtifactId>,
    pub thumbnail_id: Option<ArtifactId>,

    pub version: u32,
    pub parent_job_id: Option<Uuid>,
    pub root_job_id: Uuid,
    pub iteration_prompt: Option<String>,
    pub retry_count: u32,

    pub render_mode: Option<RenderMode>,
    pub render_duration_seconds: Option<f64>,
    pub cancel_requested: bool,

    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl VideoJob {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Prompt for a child job forked from this one with the given feedback.
    pub fn iteration_prompt_for(&self, feedback: &str) -> String {
        format!("{}{}{}", self.prompt, ITERATION_SEPARATOR, feedback)
    }
}

/// Pipeline state of a video job.
///
/// `Queued -> Scripting -> Imaging -> Narrating -> GeneratingCode -> Rendering
/// -> Completed`, with `Failed` and `Cancelled` reachable from every
/// non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Scripting,
    Imaging,
    Narrating,
    GeneratingCode,
    Rendering,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub const TERMINAL: [JobStatus; 3] = [
        JobStatus::Completed,
        JobStatus::Failed,
        JobStatus::Cancelled,
    ];

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Scripting => "scripting",
            JobStatus::Imaging => "imaging",
            JobStatus::Narrating => "narrating",
            JobStatus::GeneratingCode => "generating_code",
            JobStatus::Rendering => "rendering",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }

    /// Progress window owned by the stage running in this state.
    ///
    /// `Completed` owns the finalize window; `Queued`, `Failed` and
    /// `Cancelled` own no window.
    pub fn progress_window(self) -> Option<ProgressWindow> {
        match self {
            JobStatus::Scripting => Some(ProgressWindow::SCRIPTING),
            JobStatus::Imaging => Some(ProgressWindow::IMAGING),
            JobStatus::Narrating => Some(ProgressWindow::NARRATING),
            JobStatus::GeneratingCode => Some(ProgressWindow::CODEGEN),
            JobStatus::Rendering => Some(ProgressWindow::RENDERING),
            JobStatus::Completed => Some(ProgressWindow::FINALIZE),
            JobStatus::Queued | JobStatus::Failed | JobStatus::Cancelled => None,
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownStatus(pub String);

impl std::fmt::Display for UnknownStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown job status '{}'", self.0)
    }
}

impl std::error::Error for UnknownStatus {}

impl std::str::FromStr for JobStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(JobStatus::Queued),
            "scripting" => Ok(JobStatus::Scripting),
            "imaging" => Ok(JobStatus::Imaging),
            "narrating" => Ok(JobStatus::Narrating),
            "generating_code" => Ok(JobStatus::GeneratingCode),
            "rendering" => Ok(JobStatus::Rendering),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            "cancelled" => Ok(JobStatus::Cancelled),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// Supported output aspect ratios.
pub const ASPECT_RATIOS: [&str; 3] = ["9:16", "16:9", "1:1"];

pub fn is_supported_aspect_ratio(ratio: &str) -> bool {
    ASPECT_RATIOS.contains(&ratio)
}
