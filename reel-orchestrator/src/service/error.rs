//! Service errors
//!
//! Validation failures are returned to the caller synchronously and never
//! create a job. Store failures are passed through for the API layer to log.

use uuid::Uuid;

use crate::artifact::ArtifactError;
use crate::repository::RepositoryError;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("video job {0} not found")]
    NotFound(Uuid),

    #[error("unknown creator '{0}'")]
    UnknownCreator(String),

    #[error("video job {job_id} does not belong to creator '{creator_id}'")]
    Forbidden { job_id: Uuid, creator_id: String },

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    InvalidState(String),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Artifact(#[from] ArtifactError),
}

pub type ServiceResult<T> = Result<T, ServiceError>;
