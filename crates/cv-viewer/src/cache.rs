//! Rendition cache
//!
//! Write-once filesystem cache addressed by a salted hash of the view
//! request. Concurrent first-time writers for the same slot race safely:
//! content is deterministic per key and files are renamed into place.

use std::path::{Path, PathBuf};
use std::time::Duration;

use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::model::ViewRequest;

/// Cache errors
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// One cache slot for one view request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedRendition {
    /// Salted request hash addressing the slot.
    pub cache_key: String,
    /// File name under the cache root, `{key}.{ext}` (bare key without
    /// an extension).
    pub file_name: String,
    /// Absolute slot path.
    pub file_path: PathBuf,
    /// Lower-cased filename extension, empty if none.
    pub file_extension: String,
}

/// Filesystem rendition cache
pub struct RenditionCache {
    root: PathBuf,
}

impl RenditionCache {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Derive the slot key: SHA-256 over the canonical request JSON plus
    /// the server-side salt, hex-encoded.
    pub fn cache_key(request: &ViewRequest, salt: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(request.canonical_json().as_bytes());
        hasher.update(salt.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Locate the slot for a request.
    pub fn rendition(&self, request: &ViewRequest, salt: &str) -> CachedRendition {
        let cache_key = Self::cache_key(request, salt);
        let file_extension = request.document.extension();
        let file_name = if file_extension.is_empty() {
            cache_key.clone()
        } else {
            format!("{cache_key}.{file_extension}")
        };
        let file_path = self.root.join(&file_name);
        CachedRendition {
            cache_key,
            file_name,
            file_path,
            file_extension,
        }
    }

    pub async fn contains(&self, rendition: &CachedRendition) -> bool {
        fs::try_exists(&rendition.file_path).await.unwrap_or(false)
    }

    /// Populate a slot. Data lands in a temp file first and is renamed
    /// into place, so concurrent readers never see a partial write.
    #[instrument(skip(self, data), fields(key = %rendition.cache_key, size = data.len()))]
    pub async fn write(&self, rendition: &CachedRendition, data: &[u8]) -> Result<(), CacheError> {
        fs::create_dir_all(&self.root).await?;

        let tmp_path = self
            .root
            .join(format!("{}.{}.tmp", rendition.file_name, Uuid::new_v4()));

        let mut file = fs::File::create(&tmp_path).await?;
        file.write_all(data).await?;
        file.sync_all().await?;
        drop(file);

        fs::rename(&tmp_path, &rendition.file_path).await?;

        debug!(path = ?rendition.file_path, "Rendition cached");
        Ok(())
    }

    /// Delete entries older than `max_age`, stale temp files included.
    /// Returns the number of files removed.
    #[instrument(skip(self))]
    pub async fn sweep_older_than(&self, max_age: Duration) -> Result<usize, CacheError> {
        let mut removed = 0;
        let mut entries = match fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            let metadata = entry.metadata().await?;
            if !metadata.is_file() {
                continue;
            }
            let expired = metadata
                .modified()
                .ok()
                .and_then(|mtime| mtime.elapsed().ok())
                .is_some_and(|age| age >= max_age);
            if expired {
                match fs::remove_file(entry.path()).await {
                    Ok(()) => removed += 1,
                    // a concurrent sweep or reader may have won the race
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => warn!(path = ?entry.path(), error = %e, "Sweep failed to remove entry"),
                }
            }
        }

        if removed > 0 {
            debug!(removed, "Cache swept");
        }
        Ok(removed)
    }
}
