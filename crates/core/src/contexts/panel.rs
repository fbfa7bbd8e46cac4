use std::sync::Arc;

use async_trait::async_trait;
use tokio::{
    sync::{broadcast, watch},
    task::JoinHandle,
};
use tracing::{debug, info};

use crate::{
    assistant::{QuizGrade, grade_quiz},
    contexts::failure_title,
    format::{find_timestamp_links, format_timestamp},
    messages::{ErrorPayload, Message, Reply},
    router::{Address, Emitted, Handler, RetryPolicy, Router, TabId},
    types::{Difficulty, QuizQuestion, Summary, TranscriptSegment},
    video::VideoId,
};

pub const TRANSCRIPT_NOT_READY: &str = "Transcript not ready";

/// A `[MM:SS]` reference in assistant text; following it seeks the video.
#[derive(Debug, Clone, PartialEq)]
pub struct TimestampLink {
    pub label: String,
    pub seconds: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChatLine {
    System(String),
    User(String),
    Assistant {
        text: String,
        links: Vec<TimestampLink>,
    },
}

/// A grade along with the questions it was computed from.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GradedQuiz {
    pub grade: QuizGrade,
    pub questions: Vec<QuizQuestion>,
}

impl GradedQuiz {
    /// Each question paired with whether it was answered correctly.
    pub fn outcomes(&self) -> impl Iterator<Item = (&QuizQuestion, bool)> {
        self.questions
            .iter()
            .zip(self.grade.outcomes.iter().copied())
    }
}

/// Everything the panel shows. Rebuilt from scratch when the video changes.
#[derive(Debug, Clone, Default)]
pub struct PanelState {
    pub video_id: Option<VideoId>,
    pub transcript_loading: bool,
    pub transcript_ready: bool,
    pub transcript_failed: bool,
    pub transcript: Vec<TranscriptSegment>,
    pub chat: Vec<ChatLine>,
    pub chat_loading: bool,
    pub summary: Option<Summary>,
    pub summary_loading: bool,
    pub quiz: Vec<QuizQuestion>,
    pub answers: Vec<Option<usize>>,
    pub grade: Option<QuizGrade>,
    pub quiz_loading: bool,
    pub error: Option<ErrorPayload>,
    pub closed: bool,
    /// Bumped on every chat, summary or quiz answer and on every error.
    pub replies: u64,
}

impl PanelState {
    fn for_video(video_id: Option<VideoId>) -> Self {
        let greeting = match &video_id {
            Some(_) => "Ask anything about this video.",
            None => "Open a video to use the assistant.",
        };
        Self {
            video_id,
            chat: vec![ChatLine::System(greeting.to_string())],
            ..Self::default()
        }
    }

    fn apply(&mut self, message: Message) {
        match message {
            Message::VideoInfo { video_id } => {
                if video_id != self.video_id || self.chat.is_empty() {
                    *self = PanelState::for_video(video_id);
                }
            }
            Message::TranscriptLoading => self.transcript_loading = true,
            Message::TranscriptReady { transcript } => {
                self.transcript = transcript;
                self.transcript_loading = false;
                self.transcript_ready = true;
                self.transcript_failed = false;
            }
            Message::ChatLoading => self.chat_loading = true,
            Message::ChatResponse { message, timestamps } => {
                self.replies += 1;
                self.chat_loading = false;
                let links = assistant_links(&message, &timestamps);
                self.chat.push(ChatLine::Assistant {
                    text: message,
                    links,
                });
            }
            Message::SummaryLoading => self.summary_loading = true,
            Message::SummaryResponse {
                summary,
                key_points,
            } => {
                self.replies += 1;
                self.summary_loading = false;
                self.summary = Some(Summary {
                    text: summary,
                    key_points,
                });
            }
            Message::QuizLoading => self.quiz_loading = true,
            Message::QuizResponse { questions } => {
                self.replies += 1;
                self.quiz_loading = false;
                self.answers = vec![None; questions.len()];
                self.grade = None;
                self.quiz = questions;
            }
            Message::Error { error, message } => {
                self.replies += 1;
                if error == failure_title("fetch-transcript") {
                    self.transcript_loading = false;
                    self.transcript_failed = true;
                }
                if error == failure_title("chat") {
                    self.chat_loading = false;
                }
                if error == failure_title("summary") {
                    self.summary_loading = false;
                }
                if error == failure_title("quiz") {
                    self.quiz_loading = false;
                }
                self.error = Some(ErrorPayload::new(error, message));
            }
            other => debug!(kind = other.kind(), "panel ignores message"),
        }
    }
}

/// Links written in the text first, then any backend-suggested moments the
/// text did not mention.
fn assistant_links(text: &str, timestamps: &[f64]) -> Vec<TimestampLink> {
    let mut links: Vec<TimestampLink> = find_timestamp_links(text)
        .into_iter()
        .map(|(label, seconds)| TimestampLink { label, seconds })
        .collect();
    for &seconds in timestamps {
        let label = format!("[{}]", format_timestamp(seconds));
        if !links.iter().any(|l| l.label == label) {
            links.push(TimestampLink { label, seconds });
        }
    }
    links
}

struct PanelHandler {
    tab: TabId,
    router: Router,
    state: Arc<watch::Sender<PanelState>>,
}

#[async_trait]
impl Handler for PanelHandler {
    async fn handle(&mut self, _from: Address, message: Message) -> anyhow::Result<Reply> {
        let prefetch = matches!(&message, Message::VideoInfo { video_id: Some(_) });
        self.state.send_modify(|state| state.apply(message));
        if prefetch && !self.state.borrow().transcript_ready {
            self.router.emit(
                Address::Panel(self.tab),
                Address::Content(self.tab),
                Message::GetTranscript,
            )?;
        }
        Ok(Reply::Ack)
    }
}

/// The assistant UI of one tab. Reachable only through that tab's Content.
#[derive(Clone)]
pub struct PanelHandle {
    tab: TabId,
    router: Router,
    state: Arc<watch::Sender<PanelState>>,
    readiness: RetryPolicy,
}

pub struct Panel;

impl Panel {
    /// Attaches `Panel(tab)`, announces it to Content and starts serving.
    pub fn spawn(
        tab: TabId,
        router: Router,
        shutdown: broadcast::Receiver<()>,
    ) -> (PanelHandle, JoinHandle<()>) {
        Self::spawn_with_readiness(tab, router, RetryPolicy::readiness(), shutdown)
    }

    pub fn spawn_with_readiness(
        tab: TabId,
        router: Router,
        readiness: RetryPolicy,
        shutdown: broadcast::Receiver<()>,
    ) -> (PanelHandle, JoinHandle<()>) {
        let endpoint = router.attach(Address::Panel(tab));
        let state = Arc::new(watch::Sender::new(PanelState::default()));
        let handler = PanelHandler {
            tab,
            router: router.clone(),
            state: Arc::clone(&state),
        };
        let task = tokio::spawn(endpoint.serve(handler, shutdown));

        let handle = PanelHandle {
            tab,
            router,
            state,
            readiness,
        };
        handle.emit(Message::PanelReady);
        info!(%tab, "panel opened");
        (handle, task)
    }
}

impl PanelHandle {
    pub fn state(&self) -> PanelState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<PanelState> {
        self.state.subscribe()
    }

    fn emit(&self, message: Message) -> bool {
        let kind = message.kind();
        match self
            .router
            .emit(Address::Panel(self.tab), Address::Content(self.tab), message)
        {
            Ok(Emitted::Queued) => true,
            Ok(Emitted::Dropped) => {
                debug!(tab = %self.tab, kind, "content not attached, message dropped");
                false
            }
            Err(e) => {
                debug!(tab = %self.tab, kind, error = %e, "message not routable");
                false
            }
        }
    }

    fn show_error(&self, error: impl Into<String>, message: impl Into<String>) -> ErrorPayload {
        let payload = ErrorPayload::new(error, message);
        self.state
            .send_modify(|state| state.error = Some(payload.clone()));
        payload
    }

    /// Asks Content for the transcript and polls until it is loaded.
    pub async fn ensure_transcript(&self) -> Result<(), ErrorPayload> {
        if self.state.borrow().transcript_ready {
            return Ok(());
        }
        self.state.send_modify(|state| state.transcript_failed = false);
        self.emit(Message::GetTranscript);

        let mut rx = self.subscribe();
        let waited = self
            .readiness
            .wait_until("transcript", || {
                let state = rx.borrow_and_update();
                state.transcript_ready || state.transcript_failed
            })
            .await;

        match waited {
            Ok(()) if self.state.borrow().transcript_ready => Ok(()),
            Ok(()) => Err(self
                .state
                .borrow()
                .error
                .clone()
                .unwrap_or_else(|| ErrorPayload::new(failure_title("fetch-transcript"), ""))),
            Err(e) => Err(self.show_error(TRANSCRIPT_NOT_READY, e.to_string())),
        }
    }

    pub fn send_chat(&self, message: &str) -> Result<(), ErrorPayload> {
        let message = message.trim();
        if message.is_empty() {
            return Ok(());
        }
        self.state
            .send_modify(|state| state.chat.push(ChatLine::User(message.to_string())));
        if !self.emit(Message::ChatRequest {
            message: message.to_string(),
        }) {
            return Err(self.show_error(failure_title("chat"), "The page is not ready yet"));
        }
        Ok(())
    }

    pub async fn request_summary(&self) -> Result<(), ErrorPayload> {
        self.ensure_transcript().await?;
        self.emit(Message::SummaryRequest);
        Ok(())
    }

    pub async fn request_quiz(
        &self,
        num_questions: u32,
        difficulty: Difficulty,
    ) -> Result<(), ErrorPayload> {
        self.ensure_transcript().await?;
        self.emit(Message::QuizRequest {
            num_questions,
            difficulty,
        });
        Ok(())
    }

    /// Records an answer; the previous grade no longer applies.
    pub fn answer(&self, question: usize, option: usize) -> bool {
        self.state.send_if_modified(|state| {
            let valid = state
                .quiz
                .get(question)
                .is_some_and(|q| option < q.options.len());
            if valid {
                state.answers[question] = Some(option);
                state.grade = None;
            }
            valid
        })
    }

    /// Grades the current answers and records the grade in the state.
    pub fn grade(&self) -> GradedQuiz {
        let mut graded = GradedQuiz::default();
        self.state.send_modify(|state| {
            graded.grade = grade_quiz(&state.quiz, &state.answers);
            graded.questions = state.quiz.clone();
            state.grade = Some(graded.grade.clone());
        });
        graded
    }

    pub fn reset_quiz(&self) {
        self.state.send_modify(|state| {
            state.answers = vec![None; state.quiz.len()];
            state.grade = None;
        });
    }

    pub fn seek(&self, seconds: f64) -> bool {
        self.emit(Message::SeekVideo { timestamp: seconds })
    }

    pub fn close(&self) {
        self.emit(Message::CloseSidebar);
        self.state.send_modify(|state| state.closed = true);
    }

    pub fn dismiss_error(&self) {
        self.state.send_modify(|state| state.error = None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_video_change_rebuilds_state() {
        let mut state = PanelState::default();
        state.apply(Message::VideoInfo {
            video_id: VideoId::parse("a"),
        });
        state.apply(Message::ChatLoading);
        state.apply(Message::TranscriptReady { transcript: vec![] });
        assert!(state.chat_loading);

        state.apply(Message::VideoInfo {
            video_id: VideoId::parse("a"),
        });
        assert!(state.transcript_ready);

        state.apply(Message::VideoInfo {
            video_id: VideoId::parse("b"),
        });
        assert!(!state.transcript_ready);
        assert!(!state.chat_loading);
        assert_eq!(
            state.chat,
            vec![ChatLine::System("Ask anything about this video.".to_string())]
        );
    }

    #[test]
    fn test_error_clears_matching_loading_flag() {
        let mut state = PanelState::default();
        state.apply(Message::SummaryLoading);
        state.apply(Message::QuizLoading);
        state.apply(Message::error("Summary request failed", "timeout"));
        assert!(!state.summary_loading);
        assert!(state.quiz_loading);
        assert_eq!(
            state.error,
            Some(ErrorPayload::new("Summary request failed", "timeout"))
        );
    }

    #[test]
    fn test_links_merge_text_and_backend_timestamps() {
        let links = assistant_links("See [01:05] and [01:05].", &[65.0, 130.0]);
        let labels: Vec<&str> = links.iter().map(|l| l.label.as_str()).collect();
        assert_eq!(labels, vec!["[01:05]", "[01:05]", "[02:10]"]);
        assert_eq!(links[2].seconds, 130.0);
    }
}
