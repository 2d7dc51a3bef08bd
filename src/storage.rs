// Persisted key-value storage for small integer settings (e.g. the installed firmware version)

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use tokio::fs;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("TOML encode error: {0}")]
    Encode(#[from] toml::ser::Error),
}

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    fn has_key(&self, key: &str) -> bool;
    fn get_i32(&self, key: &str) -> Option<i32>;
    async fn set_i32(&mut self, key: &str, value: i32) -> Result<(), StorageError>;
}

/// Flat TOML table on disk. Every `set_i32` writes the whole table through.
#[derive(Debug, Clone)]
pub struct TomlStore {
    path: PathBuf,
    values: BTreeMap<String, i32>,
}

impl TomlStore {
    /// Open the store at `path`; a missing file is an empty store.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        let values = match fs::read_to_string(&path).await {
            Ok(contents) => toml::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        tracing::debug!("Opened key-value store {} ({} keys)", path.display(), values.len());
        Ok(Self { path, values })
    }

    async fn flush(&self) -> Result<(), StorageError> {
        let contents = toml::to_string(&self.values)?;
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, contents).await?;
        fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for TomlStore {
    fn has_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    fn get_i32(&self, key: &str) -> Option<i32> {
        self.values.get(key).copied()
    }

    async fn set_i32(&mut self, key: &str, value: i32) -> Result<(), StorageError> {
        self.values.insert(key.to_string(), value);
        self.flush().await
    }
}

/// In-memory store for tests and the simulated card.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    values: BTreeMap<String, i32>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: &str, value: i32) -> Self {
        self.values.insert(key.to_string(), value);
        self
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    fn has_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    fn get_i32(&self, key: &str) -> Option<i32> {
        self.values.get(key).copied()
    }

    async fn set_i32(&mut self, key: &str, value: i32) -> Result<(), StorageError> {
        self.values.insert(key.to_string(), value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = TomlStore::open(dir.path().join("nvs.toml")).await.unwrap();
        assert!(!store.has_key("version"));
        assert_eq!(store.get_i32("version"), None);
    }

    #[tokio::test]
    async fn values_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nvs.toml");
        let mut store = TomlStore::open(&path).await.unwrap();
        store.set_i32("version", 7).await.unwrap();
        store.set_i32("boots", -2).await.unwrap();

        let reopened = TomlStore::open(&path).await.unwrap();
        assert_eq!(reopened.get_i32("version"), Some(7));
        assert_eq!(reopened.get_i32("boots"), Some(-2));
        assert!(!dir.path().join("nvs.tmp").exists());
    }

    #[tokio::test]
    async fn memory_store_starts_from_seeded_values() {
        let mut store = MemoryStore::new().with("version", 3);
        assert_eq!(store.get_i32("version"), Some(3));
        store.set_i32("version", 4).await.unwrap();
        assert_eq!(store.get_i32("version"), Some(4));
        assert!(!store.has_key("boots"));
    }

    #[tokio::test]
    async fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nvs.toml");
        std::fs::write(&path, "version = \"seven\"").unwrap();
        assert!(matches!(TomlStore::open(&path).await, Err(StorageError::Parse(_))));
    }
}
