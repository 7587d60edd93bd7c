//! Reel HTTP Client
//!
//! Typed access to the Reel orchestrator API, used by the `reel` CLI and by
//! anything else that wants to queue or watch videos.
//!
//! # Example
//!
//! ```no_run
//! use reel_client::ReelClient;
//! use reel_core::dto::job::{GenerateOptions, GenerateVideo};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = ReelClient::new("http://localhost:8080");
//!
//!     let created = client.generate(&GenerateVideo {
//!         creator_id: "creator-1".to_string(),
//!         prompt: "60-second explainer about DNS".to_string(),
//!         options: GenerateOptions::default(),
//!     }).await?;
//!
//!     println!("Queued video job: {}", created.job_id);
//!     Ok(())
//! }
//! ```

pub mod error;
mod videos;

pub use error::{ClientError, Result};

use reqwest::{Client, Response};
use serde::de::DeserializeOwned;

#[derive(Debug, Clone)]
pub struct ReelClient {
    /// Orchestrator root without a trailing slash
    base_url: String,
    client: Client,
}

impl ReelClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

/// Decodes a successful JSON body or turns the status into a [`ClientError`]
async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ClientError::from_response(status, &body));
    }

    response
        .json()
        .await
        .map_err(|e| ClientError::Malformed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trailing_slash_is_dropped() {
        let client = ReelClient::new("http://localhost:8080/");
        assert_eq!(client.url("/videos"), "http://localhost:8080/videos");
    }
}
