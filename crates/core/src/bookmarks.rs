//! Per-video timestamp bookmarks.
//!
//! Each video's list lives under the video id as one JSON string and is
//! replaced whole on every mutation (read-modify-write). Concurrent writers
//! on the same video race; the last write wins.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{
    format::format_clock,
    settings::{SESSION_ID_KEY, SETTINGS_KEY},
    storage::{KeyValueStore, StorageResult},
    video::VideoId,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bookmark {
    pub time: f64,
    #[serde(rename = "desc")]
    pub description: String,
}

impl Bookmark {
    /// Bookmark for the given playback position with the default description.
    pub fn at(time: f64) -> Self {
        Self {
            time,
            description: default_description(time),
        }
    }
}

pub fn default_description(time: f64) -> String {
    format!("Bookmark at {}", format_clock(time))
}

/// Hook the host page implements to redraw its bookmark list.
pub trait BookmarkRenderer: Send + Sync {
    fn bookmarks_changed(&self, video_id: &VideoId, bookmarks: &[Bookmark]);
}

#[derive(Clone)]
pub struct BookmarkStore {
    store: Arc<dyn KeyValueStore>,
    renderer: Option<Arc<dyn BookmarkRenderer>>,
}

impl BookmarkStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            renderer: None,
        }
    }

    pub fn with_renderer(mut self, renderer: Arc<dyn BookmarkRenderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    /// Never fails: a missing, unreadable or malformed entry reads as empty.
    pub async fn list(&self, video_id: &VideoId) -> Vec<Bookmark> {
        let raw = match self.store.get(video_id.as_str()).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(e) => {
                warn!(%video_id, error = %e, "failed to read bookmarks");
                return Vec::new();
            }
        };

        match serde_json::from_str::<Vec<Bookmark>>(&raw) {
            Ok(bookmarks) => bookmarks,
            Err(e) => {
                warn!(%video_id, error = %e, "discarding malformed bookmark list");
                Vec::new()
            }
        }
    }

    /// Appends a bookmark and stores the list sorted by time.
    pub async fn add(
        &self,
        video_id: &VideoId,
        time: f64,
        description: impl Into<String>,
    ) -> StorageResult<Vec<Bookmark>> {
        let time = if time.is_finite() { time.max(0.0) } else { 0.0 };
        let mut bookmarks = self.list(video_id).await;
        bookmarks.push(Bookmark {
            time,
            description: description.into(),
        });
        bookmarks.sort_by(|a, b| a.time.total_cmp(&b.time));

        self.write(video_id, &bookmarks).await?;
        debug!(%video_id, time, count = bookmarks.len(), "bookmark added");
        Ok(bookmarks)
    }

    /// Removes every bookmark whose stored time equals `time` exactly.
    pub async fn remove(&self, video_id: &VideoId, time: f64) -> StorageResult<Vec<Bookmark>> {
        let mut bookmarks = self.list(video_id).await;
        let before = bookmarks.len();
        bookmarks.retain(|b| b.time != time);

        self.write(video_id, &bookmarks).await?;
        debug!(%video_id, time, removed = before - bookmarks.len(), "bookmarks removed");
        Ok(bookmarks)
    }

    /// Video ids that currently have a stored entry.
    pub async fn videos(&self) -> StorageResult<Vec<VideoId>> {
        Ok(self
            .store
            .keys()
            .await?
            .into_iter()
            .filter(|k| k != SETTINGS_KEY && k != SESSION_ID_KEY)
            .filter_map(|k| VideoId::parse(&k))
            .collect())
    }

    async fn write(&self, video_id: &VideoId, bookmarks: &[Bookmark]) -> StorageResult<()> {
        let raw = serde_json::to_string(bookmarks)?;
        self.store.set(video_id.as_str(), raw).await?;
        if let Some(renderer) = &self.renderer {
            renderer.bookmarks_changed(video_id, bookmarks);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::storage::MemoryStore;

    fn video() -> VideoId {
        VideoId::parse("abc123").unwrap()
    }

    fn times(bookmarks: &[Bookmark]) -> Vec<f64> {
        bookmarks.iter().map(|b| b.time).collect()
    }

    #[derive(Default)]
    struct RecordingRenderer {
        renders: Mutex<Vec<Vec<Bookmark>>>,
    }

    impl BookmarkRenderer for RecordingRenderer {
        fn bookmarks_changed(&self, _video_id: &VideoId, bookmarks: &[Bookmark]) {
            self.renders.lock().unwrap().push(bookmarks.to_vec());
        }
    }

    #[tokio::test]
    async fn test_add_to_empty_list() {
        let kv = Arc::new(MemoryStore::new());
        let store = BookmarkStore::new(kv.clone());

        let list = store
            .add(&video(), 42.5, default_description(42.5))
            .await
            .unwrap();
        assert_eq!(
            list,
            vec![Bookmark {
                time: 42.5,
                description: "Bookmark at 00:00:42".to_string()
            }]
        );
        assert_eq!(
            kv.get("abc123").await.unwrap().as_deref(),
            Some(r#"[{"time":42.5,"desc":"Bookmark at 00:00:42"}]"#)
        );
    }

    #[tokio::test]
    async fn test_add_keeps_sorted() {
        let store = BookmarkStore::new(Arc::new(MemoryStore::new()));
        store.add(&video(), 10.0, "a").await.unwrap();
        store.add(&video(), 50.0, "b").await.unwrap();
        let list = store.add(&video(), 30.0, "c").await.unwrap();
        assert_eq!(times(&list), vec![10.0, 30.0, 50.0]);
        assert_eq!(times(&store.list(&video()).await), vec![10.0, 30.0, 50.0]);
    }

    #[tokio::test]
    async fn test_remove_matches_exact_time() {
        let store = BookmarkStore::new(Arc::new(MemoryStore::new()));
        store.add(&video(), 12.25, "a").await.unwrap();
        store.add(&video(), 12.25, "dup").await.unwrap();
        store.add(&video(), 12.26, "b").await.unwrap();

        let list = store.remove(&video(), 12.25).await.unwrap();
        assert_eq!(times(&list), vec![12.26]);
        assert!(store.list(&video()).await.iter().all(|b| b.time != 12.25));
    }

    #[tokio::test]
    async fn test_malformed_entry_reads_empty() {
        let kv = Arc::new(MemoryStore::new());
        kv.set("abc123", "{oops".to_string()).await.unwrap();
        let store = BookmarkStore::new(kv);

        assert!(store.list(&video()).await.is_empty());
        let list = store.add(&video(), 5.0, "fresh").await.unwrap();
        assert_eq!(times(&list), vec![5.0]);
    }

    #[tokio::test]
    async fn test_every_mutation_renders() {
        let renderer = Arc::new(RecordingRenderer::default());
        let store =
            BookmarkStore::new(Arc::new(MemoryStore::new())).with_renderer(renderer.clone());

        store.add(&video(), 1.0, "a").await.unwrap();
        store.remove(&video(), 1.0).await.unwrap();

        let renders = renderer.renders.lock().unwrap();
        assert_eq!(renders.len(), 2);
        assert!(renders[1].is_empty());
    }

    #[tokio::test]
    async fn test_sorted_after_any_sequence() {
        let store = BookmarkStore::new(Arc::new(MemoryStore::new()));
        let ops: [(bool, f64); 8] = [
            (true, 9.0),
            (true, 3.5),
            (true, 7.0),
            (false, 3.5),
            (true, 0.0),
            (true, 7.0),
            (false, 100.0),
            (true, 1.25),
        ];
        for (add, t) in ops {
            let list = if add {
                store.add(&video(), t, "x").await.unwrap()
            } else {
                store.remove(&video(), t).await.unwrap()
            };
            assert!(list.windows(2).all(|w| w[0].time <= w[1].time));
        }
    }

    #[tokio::test]
    async fn test_videos_skips_reserved_keys() {
        let kv = Arc::new(MemoryStore::new());
        kv.set(SETTINGS_KEY, "{}".to_string()).await.unwrap();
        kv.set(SESSION_ID_KEY, "x".to_string()).await.unwrap();
        let store = BookmarkStore::new(kv);
        store.add(&video(), 1.0, "a").await.unwrap();

        assert_eq!(store.videos().await.unwrap(), vec![video()]);
    }
}
