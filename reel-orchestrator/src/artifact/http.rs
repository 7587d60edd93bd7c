use super::{ArtifactError, ArtifactStore};
use async_trait::async_trait;
use reel_core::domain::artifact::ArtifactId;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

/// Client for a remote blob store with two-step uploads.
///
/// `POST {base}/upload-url` hands out a one-time upload URL, the blob is
/// `PUT` there and the response names the stored id. Reads go through
/// `GET {base}/storage/{id}/url`.
pub struct HttpArtifactStore {
    client: Client,
    base_url: String,
    timeout: Duration,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadUrl {
    upload_url: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Uploaded {
    storage_id: String,
}

#[derive(Deserialize)]
struct ResolvedUrl {
    url: Option<String>,
}

impl HttpArtifactStore {
    /// `timeout` bounds every request made to the store
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

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, ArtifactError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        Err(ArtifactError::Rejected {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl ArtifactStore for HttpArtifactStore {
    async fn put(&self, bytes: Vec<u8>, content_type: &str) -> Result<ArtifactId, ArtifactError> {
        let response = self
            .client
            .post(format!("{}/upload-url", self.base_url))
            .timeout(self.timeout)
            .send()
            .await?;
        let UploadUrl { upload_url } = Self::check(response).await?.json().await?;

        let response = self
            .client
            .put(&upload_url)
            .timeout(self.timeout)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await?;
        let Uploaded { storage_id } = Self::check(response).await?.json().await?;

        Ok(ArtifactId::new(storage_id))
    }

    async fn url(&self, id: &ArtifactId) -> Result<Option<String>, ArtifactError> {
        let response = self
            .client
            .get(format!("{}/storage/{}/url", self.base_url, id))
            .timeout(self.timeout)
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let ResolvedUrl { url } = Self::check(response).await?.json().await?;
        Ok(url)
    }
}
