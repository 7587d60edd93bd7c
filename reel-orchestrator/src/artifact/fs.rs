use super::{ArtifactError, ArtifactStore, extension_for};
use async_trait::async_trait;
use reel_core::domain::artifact::ArtifactId;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Stores artifacts as files in one directory.
///
/// URLs are `file://` paths unless a public base URL serving the directory
/// is configured.
pub struct FsArtifactStore {
    root: PathBuf,
    public_base: Option<String>,
}

impl FsArtifactStore {
    /// Opens the store, creating the directory when missing
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, ArtifactError> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;
        let root = tokio::fs::canonicalize(&root).await?;
        Ok(Self {
            root,
            public_base: None,
        })
    }

    pub fn with_public_base(mut self, base: impl Into<String>) -> Self {
        self.public_base = Some(base.into().trim_end_matches('/').to_string());
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// On-disk location of an artifact
    pub fn path(&self, id: &ArtifactId) -> Result<PathBuf, ArtifactError> {
        let name = id.as_str();
        if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
            return Err(ArtifactError::InvalidId(name.to_string()));
        }
        Ok(self.root.join(name))
    }
}

#[async_trait]
impl ArtifactStore for FsArtifactStore {
    async fn put(&self, bytes: Vec<u8>, content_type: &str) -> Result<ArtifactId, ArtifactError> {
        let id = ArtifactId::new(format!(
            "{}.{}",
            Uuid::new_v4(),
            extension_for(content_type)
        ));
        let path = self.path(&id)?;

        // Write then rename so readers never see a partial file
        let partial = path.with_extension("partial");
        tokio::fs::write(&partial, &bytes).await?;
        tokio::fs::rename(&partial, &path).await?;

        tracing::debug!(artifact = %id, size = bytes.len(), "Stored artifact");
        Ok(id)
    }

    async fn url(&self, id: &ArtifactId) -> Result<Option<String>, ArtifactError> {
        let path = self.path(id)?;
        if !tokio::fs::try_exists(&path).await? {
            return Ok(None);
        }

        Ok(Some(match &self.public_base {
            Some(base) => format!("{}/{}", base, id),
            None => format!("file://{}", path.display()),
        }))
    }
}
