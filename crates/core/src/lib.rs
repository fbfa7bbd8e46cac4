pub mod assistant;
pub mod bookmarks;
pub mod contexts;
pub mod error;
pub mod format;
pub mod messages;
pub mod queues;
pub mod router;
pub mod settings;
pub mod storage;
pub mod types;
pub mod video;

pub use assistant::{HttpBackend, StubBackend, VideoBackend};
pub use bookmarks::{Bookmark, BookmarkRenderer, BookmarkStore};
pub use contexts::{Background, Content, ContentHandle, HostPage, Panel, PanelHandle, PanelState};
pub use error::{Result, TubemarkError};
pub use format::{format_clock, format_timestamp, format_transcript_with_timestamps};
pub use messages::{Message, Reply};
pub use router::{Address, DeliveryError, RetryPolicy, Router, TabId};
pub use settings::{Settings, SettingsStore};
pub use storage::{FileStore, KeyValueStore, MemoryStore};
pub use types::{ChatRole, ChatTurn, Difficulty, QuizQuestion, Summary, TranscriptSegment};
pub use video::{PageStatus, VideoId};
