use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use tokio::{fs, sync::Mutex};

use super::{KeyValueStore, StorageResult, check_quota, usage};

/// Store persisted as a single JSON object on disk.
///
/// The file is read on first access and rewritten in full (temp file + rename)
/// on every mutation, so a crash never leaves a half-written store behind.
pub struct FileStore {
    path: PathBuf,
    entries: Mutex<Option<BTreeMap<String, String>>>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(path: &Path) -> StorageResult<BTreeMap<String, String>> {
        match fs::read_to_string(path).await {
            Ok(content) if content.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn persist(&self, entries: &BTreeMap<String, String>) -> StorageResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_string_pretty(entries)?).await?;
        fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let mut guard = self.entries.lock().await;
        if guard.is_none() {
            *guard = Some(Self::load(&self.path).await?);
        }
        Ok(guard.as_ref().and_then(|e| e.get(key).cloned()))
    }

    async fn set(&self, key: &str, value: String) -> StorageResult<()> {
        let mut guard = self.entries.lock().await;
        if guard.is_none() {
            *guard = Some(Self::load(&self.path).await?);
        }
        let entries = guard.get_or_insert_default();

        check_quota(
            key,
            &value,
            entries.get(key).map(String::as_str),
            usage(entries.iter()),
        )?;

        let mut next = entries.clone();
        next.insert(key.to_string(), value);
        self.persist(&next).await?;
        *entries = next;
        Ok(())
    }

    async fn remove(&self, key: &str) -> StorageResult<()> {
        let mut guard = self.entries.lock().await;
        if guard.is_none() {
            *guard = Some(Self::load(&self.path).await?);
        }
        let entries = guard.get_or_insert_default();

        if entries.remove(key).is_some() {
            let snapshot = entries.clone();
            self.persist(&snapshot).await?;
        }
        Ok(())
    }

    async fn keys(&self) -> StorageResult<Vec<String>> {
        let mut guard = self.entries.lock().await;
        if guard.is_none() {
            *guard = Some(Self::load(&self.path).await?);
        }
        Ok(guard
            .as_ref()
            .map(|e| e.keys().cloned().collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StorageError;
    use tempfile::TempDir;

    fn create_test_store() -> (FileStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::new(temp_dir.path().join("nested").join("storage.json"));
        (store, temp_dir)
    }

    #[tokio::test]
    async fn test_values_survive_reopen() {
        let (store, _dir) = create_test_store();
        store
            .set("abc123", r#"[{"time":42.5,"desc":"x"}]"#.to_string())
            .await
            .unwrap();

        let reopened = FileStore::new(store.path());
        assert_eq!(
            reopened.get("abc123").await.unwrap().as_deref(),
            Some(r#"[{"time":42.5,"desc":"x"}]"#)
        );
    }

    #[tokio::test]
    async fn test_missing_file_is_empty() {
        let (store, _dir) = create_test_store();
        assert_eq!(store.get("anything").await.unwrap(), None);
        assert!(store.keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_reported() {
        let (store, _dir) = create_test_store();
        fs::create_dir_all(store.path().parent().unwrap())
            .await
            .unwrap();
        fs::write(store.path(), "{not json").await.unwrap();

        let err = store.get("k").await.unwrap_err();
        assert!(matches!(err, StorageError::Corrupt(_)));
    }

    #[tokio::test]
    async fn test_remove_persists() {
        let (store, _dir) = create_test_store();
        store.set("a", "1".to_string()).await.unwrap();
        store.remove("a").await.unwrap();

        let reopened = FileStore::new(store.path());
        assert_eq!(reopened.get("a").await.unwrap(), None);
    }
}
