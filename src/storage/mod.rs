// Content-addressed raw file storage


use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;
use uuid::Uuid;

use crate::{LoreError, Result};

/// Where a stored blob ended up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub locator: PathBuf,
    pub sha256: String,
    pub size: u64,
}

/// Stores blobs at `root/<aa>/<bb>/<sha256>`
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    #[inline]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[inline]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Hex-encoded SHA-256 of `content`
    #[inline]
    pub fn hash(content: &[u8]) -> String {
        hex::encode(Sha256::digest(content))
    }

    /// Deterministic location for a digest
    #[inline]
    pub fn locate(&self, sha256: &str) -> PathBuf {
        let mut chars = sha256.chars();
        let first: String = chars.by_ref().take(2).collect();
        let second: String = chars.take(2).collect();
        self.root.join(first).join(second).join(sha256)
    }

    /// Write `content` unless a blob with the same digest already exists
    #[inline]
    pub async fn put(&self, content: &[u8]) -> Result<StoredFile> {
        let sha256 = Self::hash(content);
        let locator = self.locate(&sha256);
        let size = u64::try_from(content.len())
            .map_err(|_| LoreError::Storage("Content too large".to_string()))?;

        if fs::try_exists(&locator).await? {
            debug!("Blob {} already stored", sha256);
            return Ok(StoredFile {
                locator,
                sha256,
                size,
            });
        }

        let parent = locator
            .parent()
            .ok_or_else(|| LoreError::Storage(format!("No parent for {}", locator.display())))?;
        fs::create_dir_all(parent).await.map_err(|e| {
            LoreError::Storage(format!("Failed to create {}: {}", parent.display(), e))
        })?;

        // Write beside the target and rename so readers never see a partial blob
        let staging = parent.join(format!(".{}.{}.tmp", sha256, Uuid::new_v4()));
        fs::write(&staging, content).await.map_err(|e| {
            LoreError::Storage(format!("Failed to write {}: {}", staging.display(), e))
        })?;
        if let Err(e) = fs::rename(&staging, &locator).await {
            let _ = fs::remove_file(&staging).await;
            return Err(LoreError::Storage(format!(
                "Failed to move blob into {}: {}",
                locator.display(),
                e
            )));
        }

        debug!("Stored {} bytes as {}", size, locator.display());
        Ok(StoredFile {
            locator,
            sha256,
            size,
        })
    }
}
