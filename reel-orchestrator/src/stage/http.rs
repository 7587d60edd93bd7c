//! HTTP stage client
//!
//! Talks JSON to a generation service exposing one endpoint per stage:
//! `POST /script`, `POST /images`, `POST /narration` and `POST /code`.
//! Error responses carry `{"error": "..."}` and become `StageError::Rejected`.

use super::{
    CodeGenerator, CodeRequest, GeneratedImage, ImageRequest, Illustrator, Narration,
    NarrationRequest, Narrator, ScriptRequest, ScriptWriter, StageError,
};
use async_trait::async_trait;
use reel_core::domain::script::{VideoScript, WordTiming};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;

pub struct HttpStageClient {
    client: Client,
    base_url: String,
    timeout: Duration,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

#[derive(Deserialize)]
struct ImagesResponse {
    urls: Vec<String>,
}

#[derive(Deserialize)]
struct NarrationResponse {
    audio_url: String,
    duration_seconds: f64,
    #[serde(default)]
    words: Vec<WordTiming>,
}

#[derive(Deserialize)]
struct CodeResponse {
    code: String,
}

#[derive(Serialize)]
struct AudioBody<'a> {
    url: &'a str,
    duration_seconds: f64,
    words: &'a [WordTiming],
}

impl HttpStageClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        let mut base_url = base_url.into();
        if base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            client: Client::new(),
            base_url,
            timeout,
        }
    }

    async fn post<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> Result<T, StageError> {
        let response = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorBody>(&text)
                .map(|b| b.error)
                .unwrap_or_else(|_| format!("{} returned {}: {}", path, status, text));
            return Err(StageError::Rejected(message));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| StageError::InvalidOutput(format!("{} response: {}", path, e)))
    }

    async fn download(&self, url: &str) -> Result<(Vec<u8>, String), StageError> {
        let response = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| self.classify(e))?
            .error_for_status()?;

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = response.bytes().await?;
        Ok((bytes.to_vec(), content_type))
    }

    fn classify(&self, error: reqwest::Error) -> StageError {
        if error.is_timeout() {
            StageError::TimedOut(self.timeout)
        } else {
            StageError::Transport(error)
        }
    }
}

#[async_trait]
impl ScriptWriter for HttpStageClient {
    async fn write_script(&self, req: &ScriptRequest) -> Result<VideoScript, StageError> {
        let script: VideoScript = self
            .post(
                "/script",
                json!({
                    "prompt": req.prompt,
                    "style": req.style,
                    "target_duration_seconds": req.target_duration_seconds,
                    "aspect_ratio": req.aspect_ratio,
                    "simplified": req.simplified,
                }),
            )
            .await?;
        script.validate().map_err(StageError::InvalidOutput)?;
        Ok(script)
    }
}

#[async_trait]
impl Illustrator for HttpStageClient {
    async fn illustrate(&self, req: &ImageRequest) -> Result<Vec<GeneratedImage>, StageError> {
        let ImagesResponse { urls } = self
            .post(
                "/images",
                json!({
                    "prompts": req.prompts,
                    "style": req.style,
                    "aspect_ratio": req.aspect_ratio,
                }),
            )
            .await?;

        let mut images = Vec::with_capacity(urls.len());
        for url in &urls {
            let (bytes, content_type) = self.download(url).await?;
            images.push(GeneratedImage {
                bytes,
                content_type,
            });
        }
        Ok(images)
    }
}

#[async_trait]
impl Narrator for HttpStageClient {
    async fn narrate(&self, req: &NarrationRequest) -> Result<Narration, StageError> {
        let response: NarrationResponse = self
            .post(
                "/narration",
                json!({ "text": req.text, "voice_id": req.voice_id }),
            )
            .await?;

        let (bytes, content_type) = self.download(&response.audio_url).await?;
        Ok(Narration {
            bytes,
            content_type,
            duration_seconds: response.duration_seconds,
            words: response.words,
        })
    }
}

#[async_trait]
impl CodeGenerator for HttpStageClient {
    async fn generate_code(&self, req: &CodeRequest) -> Result<String, StageError> {
        let audio = req.audio.as_ref().map(|a| AudioBody {
            url: &a.url,
            duration_seconds: a.duration_seconds,
            words: &a.words,
        });

        let CodeResponse { code } = self
            .post(
                "/code",
                json!({
                    "script": req.script,
                    "image_urls": req.image_urls,
                    "audio": audio,
                    "total_frames": req.total_frames,
                    "fps": req.fps,
                    "width": req.width,
                    "height": req.height,
                    "previous_code": req.previous_code,
                    "iteration_feedback": req.iteration_feedback,
                    "repair_notes": req.repair_notes,
                }),
            )
            .await?;
        Ok(code)
    }
}
