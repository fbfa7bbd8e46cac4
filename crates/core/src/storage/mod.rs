//! Durable key-value capability consumed by the bookmark store, settings and
//! the session identifier.
//!
//! Values are opaque strings (callers serialize JSON themselves). Both
//! implementations enforce the quotas of account-synced extension storage so a
//! write that would not survive sync fails locally instead.

mod error;
mod file;
mod memory;

use std::path::PathBuf;

use async_trait::async_trait;

pub use error::{StorageError, StorageResult};
pub use file::FileStore;
pub use memory::MemoryStore;

/// Maximum size of a single item (key + value), in bytes.
pub const QUOTA_BYTES_PER_ITEM: usize = 8192;
/// Maximum size of the whole store (sum of keys + values), in bytes.
pub const QUOTA_BYTES: usize = 102_400;

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> StorageResult<Option<String>>;

    async fn set(&self, key: &str, value: String) -> StorageResult<()>;

    async fn remove(&self, key: &str) -> StorageResult<()>;

    async fn keys(&self) -> StorageResult<Vec<String>>;
}

/// Default on-disk location of the file-backed store.
pub fn default_store_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("tubemark")
        .join("storage.json")
}

fn item_size(key: &str, value: &str) -> usize {
    key.len() + value.len()
}

/// Checks the quotas for replacing `key` with `value` in a store whose current
/// total usage is `used` and whose current value for `key` is `previous`.
pub(crate) fn check_quota(
    key: &str,
    value: &str,
    previous: Option<&str>,
    used: usize,
) -> StorageResult<()> {
    let size = item_size(key, value);
    if size > QUOTA_BYTES_PER_ITEM {
        return Err(StorageError::QuotaExceeded {
            key: key.to_string(),
            size,
            limit: QUOTA_BYTES_PER_ITEM,
        });
    }

    let freed = previous.map(|p| item_size(key, p)).unwrap_or(0);
    let total = used - freed + size;
    if total > QUOTA_BYTES {
        return Err(StorageError::QuotaExceeded {
            key: key.to_string(),
            size: total,
            limit: QUOTA_BYTES,
        });
    }
    Ok(())
}

pub(crate) fn usage<'a>(entries: impl Iterator<Item = (&'a String, &'a String)>) -> usize {
    entries.map(|(k, v)| item_size(k, v)).sum()
}
