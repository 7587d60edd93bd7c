//! ID resolver module
//!
//! Resolves job id prefixes to full UUIDs by searching the creator's most
//! recent jobs, so users can type `reel show 3f2b` instead of a full UUID.

use anyhow::{Context, Result, anyhow};
use reel_client::{ClientError, ReelClient};
use reel_core::dto::job::JobSummary;
use uuid::Uuid;

use crate::config::Config;
use crate::types::IdOrPrefix;

/// Jobs searched when resolving a prefix
const RESOLVE_WINDOW: u32 = 100;

/// Resolve a job ID or prefix to a full UUID
///
/// A full UUID is returned as is. A prefix must match exactly one of the
/// creator's recent jobs.
pub async fn resolve_job_id(client: &ReelClient, config: &Config, input: &str) -> Result<Uuid> {
    let id = IdOrPrefix::parse(input);
    if let IdOrPrefix::Full(uuid) = id {
        return Ok(uuid);
    }

    let creator = config
        .creator()
        .context("Resolving an id prefix needs the creator's job list")?;
    let jobs = client
        .list_jobs(creator, Some(RESOLVE_WINDOW))
        .await
        .context("Failed to fetch jobs for ID resolution")?;

    pick_unique(&id, &jobs)
}

/// Names the job when the orchestrator does not know it
pub fn for_job(job_id: Uuid) -> impl FnOnce(ClientError) -> anyhow::Error {
    move |e| {
        if e.is_not_found() {
            anyhow!("No such video job: {}", job_id)
        } else {
            e.into()
        }
    }
}

fn pick_unique(id: &IdOrPrefix, jobs: &[JobSummary]) -> Result<Uuid> {
    let matches: Vec<Uuid> = jobs.iter().map(|j| j.id).filter(|j| id.matches(j)).collect();

    match matches.as_slice() {
        [] => Err(anyhow!("No job found with ID starting with '{}'", id)),
        [only] => Ok(*only),
        _ => {
            let ids: Vec<String> = matches.iter().map(Uuid::to_string).collect();
            Err(anyhow!(
                "Ambiguous prefix '{}' matches multiple jobs: {}",
                id,
                ids.join(", ")
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reel_core::domain::job::JobStatus;

    fn summary(id: &str) -> JobSummary {
        JobSummary {
            id: Uuid::parse_str(id).unwrap(),
            prompt: "p".into(),
            status: JobStatus::Queued,
            progress: 0,
            version: 1,
            parent_job_id: None,
            created_at: Default::default(),
        }
    }

    #[test]
    fn test_pick_unique() {
        let jobs = vec![
            summary("aa000000-0000-4000-8000-000000000001"),
            summary("ab000000-0000-4000-8000-000000000002"),
        ];

        let id = pick_unique(&IdOrPrefix::parse("ab"), &jobs).unwrap();
        assert_eq!(id, jobs[1].id);

        let ambiguous = pick_unique(&IdOrPrefix::parse("a"), &jobs).unwrap_err();
        assert!(ambiguous.to_string().starts_with("Ambiguous prefix 'a'"));

        assert!(pick_unique(&IdOrPrefix::parse("ff"), &jobs).is_err());
    }

    #[test]
    fn test_missing_job_is_named() {
        let id = Uuid::parse_str("aa000000-0000-4000-8000-000000000001").unwrap();

        let missing = for_job(id)(ClientError::NotFound("video job not found".into()));
        assert_eq!(
            missing.to_string(),
            "No such video job: aa000000-0000-4000-8000-000000000001"
        );

        let other = for_job(id)(ClientError::Malformed("eof".into()));
        assert_eq!(other.to_string(), "unexpected response body: eof");
    }
}
