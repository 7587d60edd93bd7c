//! Errors returned by [`ReelClient`](crate::ReelClient)

use reqwest::StatusCode;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ClientError>;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("could not reach the orchestrator: {0}")]
    Unreachable(#[from] reqwest::Error),

    /// The job (or creator) in the path does not exist
    #[error("{0}")]
    NotFound(String),

    /// The orchestrator refused the request as it stands
    #[error("request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("orchestrator error ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("unexpected response body: {0}")]
    Malformed(String),
}

impl ClientError {
    /// Classifies a non-success response
    pub(crate) fn from_response(status: StatusCode, body: &str) -> Self {
        let message = error_message(body);
        if status == StatusCode::NOT_FOUND {
            Self::NotFound(message)
        } else if status.is_client_error() {
            Self::Rejected {
                status: status.as_u16(),
                message,
            }
        } else {
            Self::Server {
                status: status.as_u16(),
                message,
            }
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Unwraps `{ "error": message }` bodies, falling back to the raw text
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}
