//! Message store abstraction
//!
//! Narrow interface to the external message source; the resolver never
//! re-implements message parsing.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncReadExt;
use tracing::{debug, instrument};

/// Store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Message part not found: message {message_id}, part {mime_id}")]
    PartNotFound { message_id: String, mime_id: String },
    #[error("Invalid part id: {0}")]
    InvalidId(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Message store - source of raw attachment bytes
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Fetch one part's raw content.
    async fn fetch_part(&self, message_id: &str, mime_id: &str) -> StoreResult<Bytes>;

    /// Store name for logging
    fn name(&self) -> &str;
}

/// Spool-directory message store
///
/// Reads parts from `{root}/{message_id}/{mime_id}`, the layout the host
/// delivery pipeline writes message parts into.
pub struct SpoolMessageStore {
    root: PathBuf,
}

impl SpoolMessageStore {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Resolve ids to a part path, rejecting traversal attempts.
    fn resolve_path(&self, message_id: &str, mime_id: &str) -> StoreResult<PathBuf> {
        for id in [message_id, mime_id] {
            if id.is_empty()
                || id.contains("..")
                || id.contains('/')
                || id.contains('\\')
            {
                return Err(StoreError::InvalidId(id.to_string()));
            }
        }
        Ok(self.root.join(message_id).join(mime_id))
    }
}

#[async_trait]
impl MessageStore for SpoolMessageStore {
    #[instrument(skip(self), fields(store = "spool"))]
    async fn fetch_part(&self, message_id: &str, mime_id: &str) -> StoreResult<Bytes> {
        let path = self.resolve_path(message_id, mime_id)?;

        if !path.is_file() {
            return Err(StoreError::PartNotFound {
                message_id: message_id.to_string(),
                mime_id: mime_id.to_string(),
            });
        }

        let mut file = fs::File::open(&path).await?;
        let mut buffer = Vec::new();
        file.read_to_end(&mut buffer).await?;

        debug!(path = ?path, size = buffer.len(), "Message part read");

        Ok(Bytes::from(buffer))
    }

    fn name(&self) -> &str {
        "spool"
    }
}

/// In-memory message store for testing
pub struct MemoryMessageStore {
    parts: tokio::sync::RwLock<HashMap<(String, String), Bytes>>,
    fetches: AtomicU64,
}

impl Default for MemoryMessageStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryMessageStore {
    pub fn new() -> Self {
        Self {
            parts: tokio::sync::RwLock::new(HashMap::new()),
            fetches: AtomicU64::new(0),
        }
    }

    pub async fn insert(
        &self,
        message_id: impl Into<String>,
        mime_id: impl Into<String>,
        data: impl Into<Bytes>,
    ) {
        let mut parts = self.parts.write().await;
        parts.insert((message_id.into(), mime_id.into()), data.into());
    }

    /// Number of fetch_part calls served so far.
    pub fn fetches(&self) -> u64 {
        self.fetches.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl MessageStore for MemoryMessageStore {
    async fn fetch_part(&self, message_id: &str, mime_id: &str) -> StoreResult<Bytes> {
        self.fetches.fetch_add(1, Ordering::Relaxed);
        let parts = self.parts.read().await;
        parts
            .get(&(message_id.to_string(), mime_id.to_string()))
            .cloned()
            .ok_or_else(|| StoreError::PartNotFound {
                message_id: message_id.to_string(),
                mime_id: mime_id.to_string(),
            })
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_spool() -> PathBuf {
        let dir = std::env::temp_dir()
            .join("cloudview-spool-tests")
            .join(uuid::Uuid::new_v4().to_string());
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[tokio::test]
    async fn test_memory_store_fetch() {
        let store = MemoryMessageStore::new();
        store.insert("4711", "2.1", &b"%PDF-1.7"[..]).await;

        let data = store.fetch_part("4711", "2.1").await.unwrap();
        assert_eq!(data, Bytes::from_static(b"%PDF-1.7"));
        assert_eq!(store.fetches(), 1);

        let missing = store.fetch_part("4711", "9").await;
        assert!(matches!(missing, Err(StoreError::PartNotFound { .. })));
    }

    #[tokio::test]
    async fn test_spool_store_fetch() {
        let root = temp_spool();
        std::fs::create_dir_all(root.join("4711")).unwrap();
        std::fs::write(root.join("4711").join("2.1"), b"part content").unwrap();

        let store = SpoolMessageStore::new(&root);
        let data = store.fetch_part("4711", "2.1").await.unwrap();
        assert_eq!(data, Bytes::from_static(b"part content"));

        let missing = store.fetch_part("4711", "3").await;
        assert!(matches!(missing, Err(StoreError::PartNotFound { .. })));
    }

    #[tokio::test]
    async fn test_spool_store_rejects_traversal() {
        let store = SpoolMessageStore::new(temp_spool());

        let result = store.fetch_part("../../etc", "passwd").await;
        assert!(matches!(result, Err(StoreError::InvalidId(_))));

        let result = store.fetch_part("4711", "a/b").await;
        assert!(matches!(result, Err(StoreError::InvalidId(_))));

        let result = store.fetch_part("", "2.1").await;
        assert!(matches!(result, Err(StoreError::InvalidId(_))));
    }
}
