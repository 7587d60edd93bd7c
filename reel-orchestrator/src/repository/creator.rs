//! Creator directory
//!
//! Creators and their stores are managed by the marketplace. The pipeline
//! only needs to know whether a creator exists and which store new videos
//! default to.

use async_trait::async_trait;
use sqlx::PgPool;
use std::collections::HashMap;

use super::Result;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Creator {
    pub id: String,
    pub default_store_id: Option<String>,
}

#[async_trait]
pub trait CreatorDirectory: Send + Sync {
    async fn find(&self, creator_id: &str) -> Result<Option<Creator>>;
}

pub struct PgCreatorDirectory {
    pool: PgPool,
}

impl PgCreatorDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CreatorDirectory for PgCreatorDirectory {
    async fn find(&self, creator_id: &str) -> Result<Option<Creator>> {
        let row: Option<(String, Option<String>)> =
            sqlx::query_as("SELECT id, default_store_id FROM creators WHERE id = $1")
                .bind(creator_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(|(id, default_store_id)| Creator {
            id,
            default_store_id,
        }))
    }
}

/// Fixed creator list.
///
/// An open directory accepts every creator id without a default store, which
/// is what a database-less development setup runs with.
#[derive(Debug, Default)]
pub struct StaticCreatorDirectory {
    creators: HashMap<String, Creator>,
    open: bool,
}

impl StaticCreatorDirectory {
    pub fn open() -> Self {
        Self {
            creators: HashMap::new(),
            open: true,
        }
    }

    pub fn with_creators(creators: impl IntoIterator<Item = Creator>) -> Self {
        Self {
            creators: creators.into_iter().map(|c| (c.id.clone(), c)).collect(),
            open: false,
        }
    }
}

#[async_trait]
impl CreatorDirectory for StaticCreatorDirectory {
    async fn find(&self, creator_id: &str) -> Result<Option<Creator>> {
        if let Some(creator) = self.creators.get(creator_id) {
            return Ok(Some(creator.clone()));
        }
        Ok(self.open.then(|| Creator {
            id: creator_id.to_string(),
            default_store_id: None,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_closed_directory_rejects_unknown_creators() {
        let directory = StaticCreatorDirectory::with_creators([Creator {
            id: "creator-1".into(),
            default_store_id: Some("store-1".into()),
        }]);

        let known = directory.find("creator-1").await.unwrap().unwrap();
        assert_eq!(known.default_store_id.as_deref(), Some("store-1"));
        assert!(directory.find("stranger").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_open_directory_accepts_anyone() {
        let directory = StaticCreatorDirectory::open();
        let creator = directory.find("anyone").await.unwrap().unwrap();
        assert_eq!(creator.id, "anyone");
        assert!(creator.default_store_id.is_none());
    }
}
