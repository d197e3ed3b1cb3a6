//! Key-value store backends
//!
//! The app keeps all of its state as string blobs under a handful of fixed
//! keys. `KeyValueStore` is the async contract; `FileStore` keeps the whole
//! map in one JSON document on disk and `MemoryStore` keeps it in memory.

use crate::storage::error::{StorageError, StorageResult};
use crate::storage::types::StorageKey;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

/// Asynchronous string key-value store
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read a value, `None` if the key is absent
    async fn get(&self, key: StorageKey) -> StorageResult<Option<String>>;

    /// Write a value, replacing any previous one
    async fn set(&self, key: StorageKey, value: String) -> StorageResult<()>;

    /// Delete a key; removing an absent key is not an error
    async fn remove(&self, key: StorageKey) -> StorageResult<()>;
}

/// File name of the store document inside the data directory
pub const STORE_FILE: &str = "store.json";

/// Store backed by a single JSON document
///
/// The document is loaded once on open and rewritten on every mutation
/// (write to a temp file, then rename).
pub struct FileStore {
    path: PathBuf,
    entries: RwLock<BTreeMap<String, String>>,
}

impl FileStore {
    /// Open or create the store inside `data_dir`
    pub async fn open(data_dir: impl AsRef<Path>) -> StorageResult<Self> {
        let data_dir = data_dir.as_ref();
        tokio::fs::create_dir_all(data_dir).await?;

        let path = data_dir.join(STORE_FILE);
        let entries = Self::load(&path).await?;

        tracing::debug!(path = ?path, keys = entries.len(), "Opened file store");

        Ok(Self {
            path,
            entries: RwLock::new(entries),
        })
    }

    async fn load(path: &Path) -> StorageResult<BTreeMap<String, String>> {
        if !tokio::fs::try_exists(path).await? {
            return Ok(BTreeMap::new());
        }

        let content = tokio::fs::read_to_string(path).await?;
        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }

        serde_json::from_str(&content).map_err(|e| StorageError::CorruptStore(e.to_string()))
    }

    async fn persist(&self, entries: &BTreeMap<String, String>) -> StorageResult<()> {
        let content = serde_json::to_string_pretty(entries)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, content).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    /// Path of the backing document
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: StorageKey) -> StorageResult<Option<String>> {
        Ok(self.entries.read().await.get(key.as_str()).cloned())
    }

    async fn set(&self, key: StorageKey, value: String) -> StorageResult<()> {
        let mut entries = self.entries.write().await;
        entries.insert(key.as_str().to_string(), value);
        self.persist(&entries).await
    }

    async fn remove(&self, key: StorageKey) -> StorageResult<()> {
        let mut entries = self.entries.write().await;
        if entries.remove(key.as_str()).is_some() {
            self.persist(&entries).await?;
        }
        Ok(())
    }
}

/// In-memory store, contents are lost on drop
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: StorageKey) -> StorageResult<Option<String>> {
        Ok(self.entries.read().await.get(key.as_str()).cloned())
    }

    async fn set(&self, key: StorageKey, value: String) -> StorageResult<()> {
        self.entries
            .write()
            .await
            .insert(key.as_str().to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: StorageKey) -> StorageResult<()> {
        self.entries.write().await.remove(key.as_str());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_memory_store_roundtrip() {
        let store = MemoryStore::new();
        assert_eq!(store.get(StorageKey::Messages).await.unwrap(), None);

        store
            .set(StorageKey::Messages, "[]".to_string())
            .await
            .unwrap();
        assert_eq!(
            store.get(StorageKey::Messages).await.unwrap().as_deref(),
            Some("[]")
        );

        store.remove(StorageKey::Messages).await.unwrap();
        assert_eq!(store.get(StorageKey::Messages).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_file_store_persists_across_reopen() {
        let dir = tempdir().unwrap();

        {
            let store = FileStore::open(dir.path()).await.unwrap();
            store
                .set(StorageKey::CompletedMorningSurvey, "true".to_string())
                .await
                .unwrap();
            store
                .set(StorageKey::SymptomsHistory, "[]".to_string())
                .await
                .unwrap();
            store.remove(StorageKey::SymptomsHistory).await.unwrap();
        }

        let store = FileStore::open(dir.path()).await.unwrap();
        assert_eq!(
            store
                .get(StorageKey::CompletedMorningSurvey)
                .await
                .unwrap()
                .as_deref(),
            Some("true")
        );
        assert_eq!(store.get(StorageKey::SymptomsHistory).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_file_store_rejects_corrupt_document() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join(STORE_FILE), "not json").unwrap();

        let result = FileStore::open(dir.path()).await;
        assert!(matches!(result, Err(StorageError::CorruptStore(_))));
    }

    #[tokio::test]
    async fn test_remove_missing_key_is_ok() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path()).await.unwrap();
        store.remove(StorageKey::ChatHistory).await.unwrap();
        assert!(!store.path().exists());
    }
}
