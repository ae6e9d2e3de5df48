//! Persisted local state.
//!
//! A tiny key/value abstraction standing in for an editor's global state or
//! a browser's local storage. Values are plain strings.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::Result;

/// Key/value storage that survives restarts (or not, for the memory store).
#[async_trait]
pub trait StateStore: Send + Sync + std::fmt::Debug {
    /// Read a value.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write a value, replacing any previous one.
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Delete a value. Missing keys are not an error.
    async fn remove(&self, key: &str) -> Result<()>;
}

/// Process-local store, lost on exit.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    values: RwLock<HashMap<String, String>>,
}

impl MemoryStateStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.read().unwrap_or_else(PoisonError::into_inner).get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.values
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.values.write().unwrap_or_else(PoisonError::into_inner).remove(key);
        Ok(())
    }
}

/// JSON file store shared by several scopes.
///
/// Keys are namespaced as `"{scope}.{key}"` so two front-ends can share one
/// file without clobbering each other. Writes go to a temporary file that is
/// then renamed over the original.
#[derive(Debug)]
pub struct FileStateStore {
    path: PathBuf,
    scope: String,
    write_lock: Mutex<()>,
}

impl FileStateStore {
    /// Create a store backed by `path`, namespaced by `scope`.
    pub fn new(path: impl Into<PathBuf>, scope: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            scope: scope.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn scoped(&self, key: &str) -> String {
        format!("{}.{key}", self.scope)
    }

    async fn read_all(&self) -> Result<BTreeMap<String, String>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(text) if text.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(text) => Ok(serde_json::from_str(&text)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_all(&self, values: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let tmp = self.path.with_extension("tmp");
        let json = serde_json::to_string_pretty(values)?;
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl StateStore for FileStateStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let values = self.read_all().await?;
        Ok(values.get(&self.scoped(key)).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut values = self.read_all().await?;
        values.insert(self.scoped(key), value.to_string());
        self.write_all(&values).await
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut values = self.read_all().await?;
        if values.remove(&self.scoped(key)).is_some() {
            self.write_all(&values).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_store_round_trip() {
        let store = MemoryStateStore::new();
        assert_eq!(store.get("k").await.unwrap(), None);
        store.set("k", "v").await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v"));
        store.remove("k").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn file_store_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("state.json");

        let store = FileStateStore::new(&path, "editor");
        store.set("session", "abc").await.unwrap();

        let reopened = FileStateStore::new(&path, "editor");
        assert_eq!(reopened.get("session").await.unwrap().as_deref(), Some("abc"));
    }

    #[tokio::test]
    async fn file_store_scopes_do_not_collide() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");

        let editor = FileStateStore::new(&path, "editor");
        let browser = FileStateStore::new(&path, "browser");
        editor.set("session", "one").await.unwrap();
        browser.set("session", "two").await.unwrap();

        assert_eq!(editor.get("session").await.unwrap().as_deref(), Some("one"));
        assert_eq!(browser.get("session").await.unwrap().as_deref(), Some("two"));

        editor.remove("session").await.unwrap();
        assert_eq!(editor.get("session").await.unwrap(), None);
        assert_eq!(browser.get("session").await.unwrap().as_deref(), Some("two"));
    }

    #[tokio::test]
    async fn missing_file_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStateStore::new(dir.path().join("absent.json"), "x");
        assert_eq!(store.get("anything").await.unwrap(), None);
        store.remove("anything").await.unwrap();
    }
}
