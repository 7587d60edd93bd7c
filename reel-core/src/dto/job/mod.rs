//! Video job DTOs for the orchestrator API

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::job::{
    DEFAULT_ASPECT_RATIO, DEFAULT_DURATION_SECONDS, DEFAULT_STYLE, JobStatus, VideoJob,
};

/// Request to generate a fresh video from a prompt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateVideo {
    pub creator_id: String,
    pub prompt: String,
    #[serde(flatten)]
    pub options: GenerateOptions,
}

/// Optional generation settings and associations.
///
/// Missing fields take the documented defaults: style `modern`, 60 seconds,
/// aspect ratio `9:16`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateOptions {
    #[serde(default)]
    pub course_id: Option<String>,
    #[serde(default)]
    pub product_id: Option<String>,
    #[serde(default)]
    pub store_id: Option<String>,
    #[serde(default = "default_style")]
    pub style: String,
    #[serde(default = "default_duration")]
    pub target_duration_seconds: u32,
    #[serde(default = "default_aspect_ratio")]
    pub aspect_ratio: String,
    #[serde(default)]
    pub voice_id: Option<String>,
}

fn default_style() -> String {
    DEFAULT_STYLE.to_string()
}

fn default_duration() -> u32 {
    DEFAULT_DURATION_SECONDS
}

fn default_aspect_ratio() -> String {
    DEFAULT_ASPECT_RATIO.to_string()
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            course_id: None,
            product_id: None,
            store_id: None,
            style: default_style(),
            target_duration_seconds: default_duration(),
            aspect_ratio: default_aspect_ratio(),
            voice_id: None,
        }
    }
}

/// Request to fork a new version of an existing job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IterateVideo {
    pub creator_id: String,
    pub feedback: String,
}

/// Returned by generate and iterate as soon as the job record exists
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobCreated {
    pub job_id: Uuid,
}

/// Lightweight progress projection for polling callers.
///
/// URLs are resolved from artifact ids at read time and may expire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobProgress {
    pub job_id: Uuid,
    pub status: JobStatus,
    pub progress: u8,
    pub error: Option<String>,
    pub video_url: Option<String>,
    pub thumbnail_url: Option<String>,
}

/// Full job projection with every artifact resolved to a URL
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobDetails {
    #[serde(flatten)]
    pub job: VideoJob,
    pub image_urls: Vec<String>,
    pub audio_url: Option<String>,
    pub video_url: Option<String>,
    pub thumbnail_url: Option<String>,
}

/// Job summary for listings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSummary {
    pub id: Uuid,
    pub prompt: String,
    pub status: JobStatus,
    pub progress: u8,
    pub version: u32,
    pub parent_job_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl From<VideoJob> for JobSummary {
    fn from(job: VideoJob) -> Self {
        Self {
            id: job.id,
            prompt: job.prompt,
            status: job.status,
            progress: job.progress,
            version: job.version,
            parent_job_id: job.parent_job_id,
            created_at: job.created_at,
        }
    }
}

/// One node of a version chain, root first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionEntry {
    pub id: Uuid,
    pub version: u32,
    pub iteration_prompt: Option<String>,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
}

impl From<&VideoJob> for VersionEntry {
    fn from(job: &VideoJob) -> Self {
        Self {
            id: job.id,
            version: job.version,
            iteration_prompt: job.iteration_prompt.clone(),
            status: job.status,
            created_at: job.created_at,
        }
    }
}

/// Result of a cancellation request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelAccepted {
    pub job_id: Uuid,
    /// `cancelled` when the job had not started yet, otherwise the current
    /// status; the running pipeline stops at its next checkpoint.
    pub status: JobStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_request_applies_defaults() {
        let req: GenerateVideo = serde_json::from_str(
            r#"{"creator_id": "creator-1", "prompt": "60-second explainer about compression"}"#,
        )
        .unwrap();
        assert_eq!(req.options, GenerateOptions::default());
        assert_eq!(req.options.style, "modern");
        assert_eq!(req.options.target_duration_seconds, 60);
        assert_eq!(req.options.aspect_ratio, "9:16");
    }

    #[test]
    fn test_generate_request_reads_flattened_options() {
        let req: GenerateVideo = serde_json::from_str(
            r#"{"creator_id": "c", "prompt": "p", "aspect_ratio": "16:9", "store_id": "s-1"}"#,
        )
        .unwrap();
        assert_eq!(req.options.aspect_ratio, "16:9");
        assert_eq!(req.options.store_id.as_deref(), Some("s-1"));
        assert_eq!(req.options.target_duration_seconds, 60);
    }
}
