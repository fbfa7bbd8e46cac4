use std::{collections::BTreeMap, sync::Mutex};

use async_trait::async_trait;

use super::{KeyValueStore, StorageResult, check_quota, usage};

/// In-process store. Nothing survives the process; used by tests and `--ephemeral` runs.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let entries = self.entries.lock().expect("MemoryStore poisoned");
        Ok(entries.get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> StorageResult<()> {
        let mut entries = self.entries.lock().expect("MemoryStore poisoned");
        check_quota(
            key,
            &value,
            entries.get(key).map(String::as_str),
            usage(entries.iter()),
        )?;
        entries.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> StorageResult<()> {
        self.entries
            .lock()
            .expect("MemoryStore poisoned")
            .remove(key);
        Ok(())
    }

    async fn keys(&self) -> StorageResult<Vec<String>> {
        let entries = self.entries.lock().expect("MemoryStore poisoned");
        Ok(entries.keys().cloned().collect())
    }
}
