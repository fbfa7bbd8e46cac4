use std::sync::Arc;

use anyhow::{Context as _, bail};
use async_trait::async_trait;
use tokio::{
    sync::{broadcast, mpsc, oneshot},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use crate::{
    assistant::{
        ApiCall, ApiResponse, Begin, ChatRequest, QuizRequest, SessionSlot, VideoRequest,
        segments_from_rendered,
    },
    bookmarks::{Bookmark, BookmarkStore, default_description},
    contexts::{HostPage, failure_title},
    error::{Result, TubemarkError},
    messages::{Message, Reply},
    router::{Address, Endpoint, Handler, RetryPolicy, Router, TabId},
    settings::{Settings, SettingsStore},
    types::{Difficulty, Summary},
    video::{IdentityChange, IdentityLatch, NavigationObserver, VideoContextTracker, VideoId},
};

/// Things the user does directly on the page, outside the panel.
#[derive(Debug)]
pub enum ContentAction {
    AddBookmark(oneshot::Sender<Result<Bookmark>>),
    ToggleSidebar(oneshot::Sender<bool>),
}

#[derive(Clone)]
pub struct ContentHandle {
    actions: mpsc::Sender<ContentAction>,
}

impl ContentHandle {
    /// Bookmarks the current playback position.
    pub async fn add_bookmark(&self) -> Result<Bookmark> {
        let (tx, rx) = oneshot::channel();
        self.actions
            .send(ContentAction::AddBookmark(tx))
            .await
            .map_err(|_| TubemarkError::ContextGone("content"))?;
        rx.await
            .map_err(|_| TubemarkError::ContextGone("content"))?
    }

    /// Returns whether the sidebar is now visible.
    pub async fn toggle_sidebar(&self) -> Result<bool> {
        let (tx, rx) = oneshot::channel();
        self.actions
            .send(ContentAction::ToggleSidebar(tx))
            .await
            .map_err(|_| TubemarkError::ContextGone("content"))?;
        rx.await.map_err(|_| TubemarkError::ContextGone("content"))
    }
}

/// A backend call finished. Tagged with the session it was made for, so a
/// result that arrives after navigation can be recognised and dropped.
struct Completion {
    video_id: VideoId,
    generation: u64,
    endpoint: &'static str,
    result: std::result::Result<ApiResponse, String>,
}

/// The per-tab context living in the page. Owns the tab's assistant session
/// and is the only context that touches the page.
pub struct Content {
    tab: TabId,
    outbox: Outbox,
    host: Arc<dyn HostPage>,
    bookmarks: BookmarkStore,
    settings: SettingsStore,
    latch: IdentityLatch,
    session: SessionSlot,
    sidebar_open: bool,
    button_policy: RetryPolicy,
}

/// Outgoing side of a Content context: events to its panel and backend calls
/// through Background.
struct Outbox {
    tab: TabId,
    router: Router,
    completions: mpsc::UnboundedSender<Completion>,
}

impl Content {
    /// Attaches `Content(tab)` and starts serving. `observer` reports the
    /// page's navigations; the tab is torn down when it reports the page gone
    /// or `shutdown` fires.
    pub fn spawn<O: NavigationObserver + 'static>(
        tab: TabId,
        router: Router,
        host: Arc<dyn HostPage>,
        bookmarks: BookmarkStore,
        settings: SettingsStore,
        observer: O,
        shutdown: broadcast::Receiver<()>,
    ) -> (ContentHandle, JoinHandle<()>) {
        let endpoint = router.attach(Address::Content(tab));
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        let (actions_tx, actions_rx) = mpsc::channel(16);

        let content = Content {
            tab,
            outbox: Outbox {
                tab,
                router,
                completions: completions_tx,
            },
            host,
            bookmarks,
            settings,
            latch: IdentityLatch::new(),
            session: SessionSlot::new(),
            sidebar_open: false,
            button_policy: RetryPolicy::dom_affordance(),
        };

        let task = tokio::spawn(content.run(
            endpoint,
            observer,
            actions_rx,
            completions_rx,
            shutdown,
        ));
        (
            ContentHandle {
                actions: actions_tx,
            },
            task,
        )
    }

    async fn run<O: NavigationObserver + 'static>(
        mut self,
        endpoint: Endpoint,
        observer: O,
        mut actions: mpsc::Receiver<ContentAction>,
        mut completions: mpsc::UnboundedReceiver<Completion>,
        mut shutdown: broadcast::Receiver<()>,
    ) {
        let (changes_tx, mut changes) = mpsc::channel::<IdentityChange>(8);
        tokio::spawn(VideoContextTracker::default().run(observer, changes_tx));
        info!(tab = %self.tab, "content started");

        loop {
            tokio::select! {
                _ = shutdown.recv() => break,
                envelope = endpoint.recv() => endpoint.dispatch(&mut self, envelope).await,
                change = changes.recv() => match change {
                    Some(change) => self.identity_observed(change.current).await,
                    None => {
                        debug!(tab = %self.tab, "page gone");
                        break;
                    }
                },
                Some(completion) = completions.recv() => self.completed(completion),
                Some(action) = actions.recv() => self.act(action).await,
            }
        }
        info!(tab = %self.tab, "content stopped");
    }

    fn current_video(&self) -> Option<VideoId> {
        self.session.current().map(|s| s.video_id().clone())
    }

    /// Both the tracker and Background report identities; only real
    /// transitions reset the session.
    async fn identity_observed(&mut self, next: Option<VideoId>) {
        let Some(change) = self.latch.observe(next) else {
            return;
        };
        info!(
            tab = %self.tab,
            previous = ?change.previous,
            current = ?change.current,
            "video changed, session reset"
        );
        self.session.reset(change.current.clone());
        self.outbox.emit_to_panel(Message::VideoInfo {
            video_id: change.current.clone(),
        });

        let Some(video_id) = change.current else {
            return;
        };
        let bookmarks = self.bookmarks.list(&video_id).await;
        self.host.bookmarks_changed(&video_id, &bookmarks);
        self.attach_button();
    }

    fn attach_button(&self) {
        let host = Arc::clone(&self.host);
        let policy = self.button_policy;
        let tab = self.tab;
        tokio::spawn(async move {
            if let Err(e) = policy
                .wait_until("bookmark button", || host.attach_bookmark_button())
                .await
            {
                warn!(%tab, error = %e, "player controls never appeared, no bookmark button");
            }
        });
    }

    async fn current_settings(&self) -> Settings {
        self.settings.load().await.unwrap_or_else(|e| {
            warn!(error = %e, "settings unavailable, using defaults");
            Settings::default()
        })
    }

    fn request_transcript(&mut self) -> anyhow::Result<()> {
        let video_id = self.current_video().context("no video on this page")?;
        let Some(session) = self.session.current_mut() else {
            return Ok(());
        };

        match session.begin_transcript() {
            Begin::Cached(transcript) => {
                self.outbox
                    .emit_to_panel(Message::TranscriptReady { transcript })
            }
            Begin::InFlight => self.outbox.emit_to_panel(Message::TranscriptLoading),
            Begin::Started => {
                self.outbox.emit_to_panel(Message::TranscriptLoading);
                match segments_from_rendered(&self.host.rendered_transcript()) {
                    Ok(segments) if !segments.is_empty() => {
                        debug!(tab = %self.tab, count = segments.len(), "page transcript");
                        session.complete_transcript(Ok(segments.clone()));
                        self.outbox.emit_to_panel(Message::TranscriptReady {
                            transcript: segments,
                        });
                    }
                    Ok(_) => self.outbox.start_call(
                        ApiCall::FetchTranscript(VideoRequest {
                            video_id,
                            transcript: None,
                        }),
                        session.generation(),
                    ),
                    Err(e) => {
                        session.complete_transcript(Err(e.to_string()));
                        self.outbox.emit_to_panel(Message::error(
                            failure_title("fetch-transcript"),
                            e.to_string(),
                        ));
                    }
                }
            }
        }
        Ok(())
    }

    async fn request_chat(&mut self, message: String) -> anyhow::Result<()> {
        let include = self.current_settings().await.use_transcript;
        let session = self.session.current_mut().context("no video on this page")?;
        let chat_history = session.push_user_message(message.clone());
        let call = ApiCall::Chat(ChatRequest {
            video_id: session.video_id().clone(),
            transcript: session.transcript_for_request(include),
            message,
            chat_history,
        });

        self.outbox.emit_to_panel(Message::ChatLoading);
        self.outbox.start_call(call, session.generation());
        Ok(())
    }

    async fn request_summary(&mut self) -> anyhow::Result<()> {
        let settings = self.current_settings().await;
        if !settings.use_summary {
            bail!("summaries are turned off in settings");
        }
        let include = settings.use_transcript;
        let session = self.session.current_mut().context("no video on this page")?;
        match session.begin_summary() {
            Begin::Cached(summary) => self.outbox.emit_to_panel(Message::SummaryResponse {
                summary: summary.text,
                key_points: summary.key_points,
            }),
            Begin::InFlight => self.outbox.emit_to_panel(Message::SummaryLoading),
            Begin::Started => {
                let call = ApiCall::Summary(VideoRequest {
                    video_id: session.video_id().clone(),
                    transcript: session.transcript_for_request(include),
                });
                self.outbox.emit_to_panel(Message::SummaryLoading);
                self.outbox.start_call(call, session.generation());
            }
        }
        Ok(())
    }

    async fn request_quiz(
        &mut self,
        num_questions: u32,
        difficulty: Difficulty,
    ) -> anyhow::Result<()> {
        let include = self.current_settings().await.use_transcript;
        let session = self.session.current_mut().context("no video on this page")?;
        match session.begin_quiz() {
            Begin::Cached(questions) => {
                self.outbox
                    .emit_to_panel(Message::QuizResponse { questions })
            }
            Begin::InFlight => self.outbox.emit_to_panel(Message::QuizLoading),
            Begin::Started => {
                let call = ApiCall::Quiz(QuizRequest {
                    video_id: session.video_id().clone(),
                    transcript: session.transcript_for_request(include),
                    num_questions,
                    difficulty,
                });
                self.outbox.emit_to_panel(Message::QuizLoading);
                self.outbox.start_call(call, session.generation());
            }
        }
        Ok(())
    }

    fn completed(&mut self, completion: Completion) {
        let Completion {
            video_id,
            generation,
            endpoint,
            result,
        } = completion;

        let Some(session) = self.session.for_session(&video_id, generation) else {
            debug!(tab = %self.tab, %video_id, endpoint, "discarding stale completion");
            return;
        };

        let message = match result {
            Ok(ApiResponse::FetchTranscript(r)) => {
                session.complete_transcript(Ok(r.transcript.clone()));
                Message::TranscriptReady {
                    transcript: r.transcript,
                }
            }
            Ok(ApiResponse::Chat(r)) => {
                session.complete_chat(Ok(r.response.clone()));
                Message::ChatResponse {
                    message: r.response,
                    timestamps: r.relevant_timestamps.unwrap_or_default(),
                }
            }
            Ok(ApiResponse::Summary(r)) => {
                session.complete_summary(Ok(Summary {
                    text: r.summary.clone(),
                    key_points: r.key_points.clone(),
                }));
                Message::SummaryResponse {
                    summary: r.summary,
                    key_points: r.key_points,
                }
            }
            Ok(ApiResponse::Quiz(r)) => {
                session.complete_quiz(Ok(r.questions.clone()));
                Message::QuizResponse {
                    questions: r.questions,
                }
            }
            Err(reason) => {
                warn!(tab = %self.tab, %video_id, endpoint, %reason, "assistant request failed");
                match endpoint {
                    "fetch-transcript" => session.complete_transcript(Err(reason.clone())),
                    "chat" => session.complete_chat(Err(reason.clone())),
                    "summary" => session.complete_summary(Err(reason.clone())),
                    _ => session.complete_quiz(Err(reason.clone())),
                }
                Message::error(failure_title(endpoint), reason)
            }
        };
        self.outbox.emit_to_panel(message);
    }

    async fn act(&mut self, action: ContentAction) {
        match action {
            ContentAction::AddBookmark(reply) => {
                let _ = reply.send(self.add_bookmark().await);
            }
            ContentAction::ToggleSidebar(reply) => {
                self.sidebar_open = !self.sidebar_open;
                self.host.set_sidebar_visible(self.sidebar_open);
                let _ = reply.send(self.sidebar_open);
            }
        }
    }

    async fn add_bookmark(&mut self) -> Result<Bookmark> {
        let video_id = self.current_video().ok_or(TubemarkError::NoVideo)?;
        let time = self.host.current_time();
        let bookmark = Bookmark::at(time);
        self.bookmarks
            .add(&video_id, bookmark.time, default_description(bookmark.time))
            .await?;
        info!(tab = %self.tab, %video_id, time, "bookmark added");
        Ok(bookmark)
    }
}

impl Outbox {
    fn emit_to_panel(&self, message: Message) {
        let kind = message.kind();
        if let Err(e) = self
            .router
            .emit(Address::Content(self.tab), Address::Panel(self.tab), message)
        {
            warn!(tab = %self.tab, kind, error = %e, "failed to notify panel");
        }
    }

    /// Assistant requests arrive as events, so failures go to the panel
    /// instead of a reply.
    fn report(&self, result: anyhow::Result<()>, endpoint: &'static str) {
        if let Err(e) = result {
            warn!(tab = %self.tab, endpoint, error = %e, "assistant request rejected");
            self.emit_to_panel(Message::error(failure_title(endpoint), format!("{e:#}")));
        }
    }

    fn start_call(&self, call: ApiCall, generation: u64) {
        let router = self.router.clone();
        let tab = self.tab;
        let completions = self.completions.clone();
        let video_id = call.video_id().clone();
        let endpoint = call.endpoint();

        tokio::spawn(async move {
            let reply = RetryPolicy::readiness()
                .retry_until_ready("background", || {
                    router.request(
                        Address::Content(tab),
                        Address::Background,
                        Message::ApiRequest { call: call.clone() },
                    )
                })
                .await;

            let result = match reply.map(Reply::into_result) {
                Ok(Ok(Reply::Api { response })) => Ok(response),
                Ok(Ok(other)) => Err(format!("unexpected reply {other:?}")),
                Ok(Err(payload)) => Err(payload.message),
                Err(e) => Err(e.to_string()),
            };
            // The receiver only goes away with the context itself.
            let _ = completions.send(Completion {
                video_id,
                generation,
                endpoint,
                result,
            });
        });
    }
}

#[async_trait]
impl Handler for Content {
    async fn handle(&mut self, from: Address, message: Message) -> anyhow::Result<Reply> {
        match message {
            Message::NewVideo { video_id } => self.identity_observed(Some(video_id)).await,
            Message::Play { value } | Message::SeekVideo { timestamp: value } => {
                self.host.seek(value.max(0.0))
            }
            Message::Delete { value } => {
                let video_id = self.current_video().context("no video on this page")?;
                let bookmarks = self.bookmarks.remove(&video_id, value).await?;
                return Ok(Reply::Bookmarks { bookmarks });
            }
            Message::GetTranscript => {
                let result = self.request_transcript();
                self.outbox.report(result, "fetch-transcript");
            }
            Message::ChatRequest { message } => {
                let result = self.request_chat(message).await;
                self.outbox.report(result, "chat");
            }
            Message::SummaryRequest => {
                let result = self.request_summary().await;
                self.outbox.report(result, "summary");
            }
            Message::QuizRequest {
                num_questions,
                difficulty,
            } => {
                let result = self.request_quiz(num_questions, difficulty).await;
                self.outbox.report(result, "quiz");
            }
            Message::CloseSidebar => {
                self.sidebar_open = false;
                self.host.set_sidebar_visible(false);
            }
            Message::PanelReady => self.outbox.emit_to_panel(Message::VideoInfo {
                video_id: self.latch.current().cloned(),
            }),
            other => debug!(tab = %self.tab, %from, kind = other.kind(), "content ignores message"),
        }
        Ok(Reply::Ack)
    }
}
