//! Per-tab assistant state. Nothing here is persisted: a session lives for
//! one video in one tab and is dropped whole when the identity changes.

use crate::{
    types::{ChatTurn, QuizQuestion, Summary, TranscriptSegment},
    video::VideoId,
};

#[derive(Debug, Clone, PartialEq, Default)]
pub enum ArtifactState<T> {
    #[default]
    Absent,
    Loading,
    Ready(T),
    Error(String),
}

impl<T> ArtifactState<T> {
    pub fn is_loading(&self) -> bool {
        matches!(self, ArtifactState::Loading)
    }

    pub fn ready(&self) -> Option<&T> {
        match self {
            ArtifactState::Ready(value) => Some(value),
            _ => None,
        }
    }

    fn complete(&mut self, result: Result<T, String>) {
        *self = match result {
            Ok(value) => ArtifactState::Ready(value),
            Err(message) => ArtifactState::Error(message),
        };
    }
}

/// What a `begin_*` call decided.
#[derive(Debug, Clone, PartialEq)]
pub enum Begin<T> {
    /// Already ready; answer from cache, no backend call.
    Cached(T),
    /// Moved to loading; the caller must start the fetch.
    Started,
    /// A fetch is already running; its completion will answer.
    InFlight,
}

#[derive(Debug, Clone)]
pub struct AssistantSession {
    video_id: VideoId,
    generation: u64,
    transcript: ArtifactState<Vec<TranscriptSegment>>,
    chat_history: Vec<ChatTurn>,
    chat_loading: bool,
    summary: ArtifactState<Summary>,
    quiz: ArtifactState<Vec<QuizQuestion>>,
}

impl AssistantSession {
    pub fn new(video_id: VideoId) -> Self {
        Self {
            video_id,
            generation: 0,
            transcript: ArtifactState::Absent,
            chat_history: Vec::new(),
            chat_loading: false,
            summary: ArtifactState::Absent,
            quiz: ArtifactState::Absent,
        }
    }

    pub fn video_id(&self) -> &VideoId {
        &self.video_id
    }

    /// Distinguishes this session from earlier ones for the same video.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn transcript(&self) -> &ArtifactState<Vec<TranscriptSegment>> {
        &self.transcript
    }

    pub fn chat_history(&self) -> &[ChatTurn] {
        &self.chat_history
    }

    pub fn chat_loading(&self) -> bool {
        self.chat_loading
    }

    pub fn summary(&self) -> &ArtifactState<Summary> {
        &self.summary
    }

    pub fn quiz(&self) -> &ArtifactState<Vec<QuizQuestion>> {
        &self.quiz
    }

    /// The transcript to attach to a backend request, if loaded and wanted.
    pub fn transcript_for_request(&self, include: bool) -> Option<Vec<TranscriptSegment>> {
        include.then(|| self.transcript.ready().cloned()).flatten()
    }

    pub fn begin_transcript(&mut self) -> Begin<Vec<TranscriptSegment>> {
        match &self.transcript {
            ArtifactState::Ready(segments) => Begin::Cached(segments.clone()),
            ArtifactState::Loading => Begin::InFlight,
            ArtifactState::Absent | ArtifactState::Error(_) => {
                self.transcript = ArtifactState::Loading;
                Begin::Started
            }
        }
    }

    pub fn complete_transcript(&mut self, result: Result<Vec<TranscriptSegment>, String>) {
        self.transcript.complete(result);
    }

    /// Appends the user turn right away and returns the history to send,
    /// which includes it.
    pub fn push_user_message(&mut self, message: impl Into<String>) -> Vec<ChatTurn> {
        self.chat_history.push(ChatTurn::user(message));
        self.chat_loading = true;
        self.chat_history.clone()
    }

    /// A failed turn leaves the user message in place without an answer.
    pub fn complete_chat(&mut self, result: Result<String, String>) {
        self.chat_loading = false;
        if let Ok(response) = result {
            self.chat_history.push(ChatTurn::assistant(response));
        }
    }

    pub fn begin_summary(&mut self) -> Begin<Summary> {
        match &self.summary {
            ArtifactState::Ready(summary) => Begin::Cached(summary.clone()),
            ArtifactState::Loading => Begin::InFlight,
            ArtifactState::Absent | ArtifactState::Error(_) => {
                self.summary = ArtifactState::Loading;
                Begin::Started
            }
        }
    }

    pub fn complete_summary(&mut self, result: Result<Summary, String>) {
        self.summary.complete(result);
    }

    /// Quizzes are regenerated on every request since the parameters may differ.
    pub fn begin_quiz(&mut self) -> Begin<Vec<QuizQuestion>> {
        if self.quiz.is_loading() {
            return Begin::InFlight;
        }
        self.quiz = ArtifactState::Loading;
        Begin::Started
    }

    pub fn complete_quiz(&mut self, result: Result<Vec<QuizQuestion>, String>) {
        self.quiz.complete(result);
    }
}

/// The single session slot of a tab, reused across videos.
#[derive(Debug, Default)]
pub struct SessionSlot {
    session: Option<AssistantSession>,
    next_generation: u64,
}

impl SessionSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Discards the current session and opens an empty one for `video_id`
    /// (or none when the page no longer shows a video).
    pub fn reset(&mut self, video_id: Option<VideoId>) {
        self.next_generation += 1;
        let generation = self.next_generation;
        self.session = video_id.map(|video_id| AssistantSession {
            generation,
            ..AssistantSession::new(video_id)
        });
    }

    pub fn current(&self) -> Option<&AssistantSession> {
        self.session.as_ref()
    }

    pub fn current_mut(&mut self) -> Option<&mut AssistantSession> {
        self.session.as_mut()
    }

    /// The session a call was started from, if it is still the current one.
    /// Completions from any earlier session find nothing here, even when the
    /// tab has since returned to the same video.
    pub fn for_session(
        &mut self,
        video_id: &VideoId,
        generation: u64,
    ) -> Option<&mut AssistantSession> {
        self.session.as_mut().filter(|session| {
            session.video_id() == video_id && session.generation() == generation
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(raw: &str) -> VideoId {
        VideoId::parse(raw).unwrap()
    }

    fn segment(start: f64) -> TranscriptSegment {
        TranscriptSegment {
            text: "hello".to_string(),
            start,
            duration: 5.0,
        }
    }

    #[test]
    fn test_transcript_transitions() {
        let mut session = AssistantSession::new(id("a"));
        assert_eq!(session.begin_transcript(), Begin::Started);
        assert_eq!(session.begin_transcript(), Begin::InFlight);

        session.complete_transcript(Err("no captions".to_string()));
        assert_eq!(
            session.transcript(),
            &ArtifactState::Error("no captions".to_string())
        );

        assert_eq!(session.begin_transcript(), Begin::Started);
        session.complete_transcript(Ok(vec![segment(0.0)]));
        assert_eq!(session.begin_transcript(), Begin::Cached(vec![segment(0.0)]));
    }

    #[test]
    fn test_chat_appends_optimistically() {
        let mut session = AssistantSession::new(id("a"));
        let history = session.push_user_message("hi");
        assert_eq!(history, vec![ChatTurn::user("hi")]);
        assert!(session.chat_loading());

        session.complete_chat(Ok("hello".to_string()));
        assert!(!session.chat_loading());
        assert_eq!(
            session.chat_history(),
            &[ChatTurn::user("hi"), ChatTurn::assistant("hello")]
        );

        session.push_user_message("again");
        session.complete_chat(Err("boom".to_string()));
        assert_eq!(session.chat_history().len(), 3);
    }

    #[test]
    fn test_transcript_omitted_when_disabled() {
        let mut session = AssistantSession::new(id("a"));
        assert_eq!(session.transcript_for_request(true), None);
        session.begin_transcript();
        session.complete_transcript(Ok(vec![segment(1.0)]));
        assert_eq!(session.transcript_for_request(false), None);
        assert_eq!(session.transcript_for_request(true), Some(vec![segment(1.0)]));
    }

    #[test]
    fn test_navigation_discards_everything() {
        let mut slot = SessionSlot::new();
        slot.reset(Some(id("a")));
        let session = slot.current_mut().unwrap();
        session.begin_transcript();
        session.complete_transcript(Ok(vec![segment(0.0)]));
        session.push_user_message("hi");
        session.begin_summary();
        session.complete_summary(Err("x".to_string()));
        session.begin_quiz();

        slot.reset(Some(id("b")));
        let fresh = slot.current().unwrap();
        assert_eq!(fresh.video_id(), &id("b"));
        assert_eq!(fresh.transcript(), &ArtifactState::Absent);
        assert!(fresh.chat_history().is_empty());
        assert_eq!(fresh.summary(), &ArtifactState::Absent);
        assert_eq!(fresh.quiz(), &ArtifactState::Absent);

        let generation = fresh.generation();
        assert!(slot.for_session(&id("a"), generation).is_none());
        assert!(slot.for_session(&id("b"), generation).is_some());

        slot.reset(None);
        assert!(slot.current().is_none());
    }

    #[test]
    fn test_returning_to_a_video_starts_a_new_session() {
        let mut slot = SessionSlot::new();
        slot.reset(Some(id("a")));
        let first = slot.current().unwrap().generation();

        slot.reset(Some(id("b")));
        slot.reset(Some(id("a")));
        let second = slot.current().unwrap().generation();

        assert_ne!(first, second);
        assert!(slot.for_session(&id("a"), first).is_none());
        assert!(slot.for_session(&id("a"), second).is_some());
    }
}
