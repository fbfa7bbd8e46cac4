//! Assistant side of a tab: backend wire types, backends, session state,
//! transcript extraction and quiz grading.

pub mod api;
pub mod backend;
pub mod quiz;
pub mod session;
pub mod stub;
pub mod transcript;

pub use api::*;
pub use backend::{BackendError, DEFAULT_API_BASE, HttpBackend, SESSION_HEADER, VideoBackend};
pub use quiz::{QuizGrade, grade_quiz};
pub use session::{ArtifactState, AssistantSession, Begin, SessionSlot};
pub use stub::StubBackend;
pub use transcript::{ExtractionError, LAST_SEGMENT_DURATION, RenderedCue, segments_from_rendered};
