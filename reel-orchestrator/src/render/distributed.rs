//! Render farm backend
//!
//! Submits compositions to a remote function-based render farm and polls it
//! for progress. The finished file is downloaded from the farm's bucket so
//! it can be re-uploaded to the artifact store.

use super::{
    OutputLocation, PollPolicy, RenderBackend, RenderError, RenderHandle, RenderObserver,
    RenderStatus,
};
use async_trait::async_trait;
use reel_core::domain::render::{RenderMode, RenderSpec};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Upper bound for a single farm request unless configured otherwise.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct DistributedRenderBackend {
    client: Client,
    farm_url: String,
    function: String,
    policy: PollPolicy,
    request_timeout: Duration,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SubmitRender<'a> {
    generated_code: &'a str,
    #[serde(rename = "imageURLs")]
    image_urls: &'a [String],
    #[serde(rename = "audioURL")]
    audio_url: Option<&'a str>,
    total_frames: u32,
    width: u32,
    height: u32,
    fps: u32,
    codec: &'a str,
    image_format: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Submitted {
    render_id: String,
    bucket_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FarmProgress {
    overall_progress: f64,
    done: bool,
    #[serde(default)]
    fatal_error_encountered: bool,
    #[serde(default)]
    errors: Vec<FarmError>,
    output_file: Option<String>,
}

/// Farms report errors either as plain strings or as objects with a message
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FarmError {
    Message(String),
    Detailed { message: String },
}

impl FarmError {
    fn message(&self) -> &str {
        match self {
            FarmError::Message(m) | FarmError::Detailed { message: m } => m,
        }
    }
}

impl DistributedRenderBackend {
    pub fn new(farm_url: &str, function: &str, policy: PollPolicy) -> Self {
        Self {
            client: Client::new(),
            farm_url: farm_url.trim_end_matches('/').to_string(),
            function: function.to_string(),
            policy,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    fn renders_url(&self) -> String {
        format!("{}/functions/{}/renders", self.farm_url, self.function)
    }

    /// Farm hiccups during a poll; the driver counts them as polls without progress.
    fn unavailable(error: reqwest::Error) -> RenderError {
        if error.is_decode() {
            RenderError::Transport(error)
        } else {
            RenderError::Unavailable(error.to_string())
        }
    }
}

#[async_trait]
impl RenderBackend for DistributedRenderBackend {
    fn mode(&self) -> RenderMode {
        RenderMode::Distributed
    }

    fn poll_policy(&self) -> PollPolicy {
        self.policy
    }

    async fn submit(&self, spec: &RenderSpec) -> Result<RenderHandle, RenderError> {
        let body = SubmitRender {
            generated_code: &spec.code,
            image_urls: &spec.image_urls,
            audio_url: spec.audio_url.as_deref(),
            total_frames: spec.total_frames,
            width: spec.width,
            height: spec.height,
            fps: spec.fps,
            codec: &spec.codec,
            image_format: &spec.image_format,
        };

        let response = self
            .client
            .post(self.renders_url())
            .timeout(self.request_timeout)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(RenderError::Submit(format!("farm returned {}: {}", status, text)));
        }

        let submitted: Submitted = response.json().await?;
        Ok(RenderHandle::remote(submitted.render_id, submitted.bucket_name))
    }

    async fn poll(
        &self,
        handle: &mut RenderHandle,
        _observer: &dyn RenderObserver,
    ) -> Result<RenderStatus, RenderError> {
        let response = self
            .client
            .get(format!("{}/{}", self.renders_url(), handle.render_id))
            .query(&[("bucketName", handle.bucket.as_deref().unwrap_or_default())])
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(Self::unavailable)?;

        let status = response.status();
        if status.is_server_error() {
            return Err(RenderError::Unavailable(format!("farm returned {}", status)));
        }
        let progress: FarmProgress = response
            .error_for_status()?
            .json()
            .await
            .map_err(Self::unavailable)?;

        if progress.fatal_error_encountered {
            let messages: Vec<&str> = progress.errors.iter().map(FarmError::message).collect();
            let reason = if messages.is_empty() {
                "render farm reported a fatal error".to_string()
            } else {
                messages.join("; ")
            };
            return Err(RenderError::Fatal(reason));
        }

        if progress.done {
            let url = progress.output_file.ok_or(RenderError::MissingOutput)?;
            handle.output = Some(OutputLocation::Remote(url));
        }

        Ok(RenderStatus {
            progress: progress.overall_progress,
            done: progress.done,
        })
    }

    async fn fetch_output(&self, handle: &RenderHandle) -> Result<Vec<u8>, RenderError> {
        let Some(OutputLocation::Remote(url)) = &handle.output else {
            return Err(RenderError::MissingOutput);
        };

        let bytes = self
            .client
            .get(url)
            .timeout(self.request_timeout)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;
        Ok(bytes.to_vec())
    }
}
