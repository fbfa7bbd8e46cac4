use std::sync::Arc;

use async_trait::async_trait;
use tokio::{sync::broadcast, task::JoinHandle};
use tracing::{debug, info, warn};

use crate::{
    assistant::{ApiCall, VideoBackend},
    contexts::failure_title,
    messages::{ErrorPayload, Message, Reply},
    router::{Address, Emitted, Endpoint, Envelope, Handler, Router, TabId},
    settings::SettingsStore,
    video::VideoId,
};

/// Process-wide coordinator. Owns the network side effects: every backend
/// call from any tab goes through here.
#[derive(Clone)]
pub struct Background {
    router: Router,
    backend: Arc<dyn VideoBackend>,
    settings: SettingsStore,
}

impl Background {
    pub fn new(router: Router, backend: Arc<dyn VideoBackend>, settings: SettingsStore) -> Self {
        Self {
            router,
            backend,
            settings,
        }
    }

    /// Host callback for "tab finished loading `url`". Pushes `NEW_VIDEO` to
    /// that tab's Content context when the URL is a watch page.
    pub fn tab_updated(&self, tab: TabId, url: &str) -> Option<Emitted> {
        let video_id = VideoId::from_url(url)?;
        match self.router.emit(
            Address::Background,
            Address::Content(tab),
            Message::NewVideo {
                video_id: video_id.clone(),
            },
        ) {
            Ok(Emitted::Dropped) => {
                debug!(%tab, %video_id, "content not attached yet, NEW_VIDEO dropped");
                Some(Emitted::Dropped)
            }
            Ok(emitted) => Some(emitted),
            Err(e) => {
                warn!(%tab, error = %e, "failed to notify content");
                None
            }
        }
    }

    pub fn spawn(self, shutdown: broadcast::Receiver<()>) -> JoinHandle<()> {
        let endpoint = self.router.attach(Address::Background);
        tokio::spawn(self.run(endpoint, shutdown))
    }

    async fn run(self, endpoint: Endpoint, mut shutdown: broadcast::Receiver<()>) {
        info!("background started");
        let mut handler = BackgroundHandler {
            settings: self.settings.clone(),
        };

        loop {
            tokio::select! {
                _ = shutdown.recv() => break,
                envelope = endpoint.recv() => match envelope {
                    Envelope {
                        message: Message::ApiRequest { call },
                        reply: Some(responder),
                        from,
                        ..
                    } => {
                        let this = self.clone();
                        tokio::spawn(async move {
                            responder.send(this.proxy(from, call).await);
                        });
                    }
                    envelope => endpoint.dispatch(&mut handler, envelope).await,
                },
            }
        }
        info!("background stopped");
    }

    /// Runs one backend call. Slow calls never hold up the inbox; each gets
    /// its own task.
    async fn proxy(&self, from: Address, call: ApiCall) -> Reply {
        let endpoint = call.endpoint();
        let session_id = match self.settings.session_id().await {
            Ok(id) => id,
            Err(e) => {
                warn!(error = %e, "session id unavailable");
                return Reply::Error(ErrorPayload::new(failure_title(endpoint), e.to_string()));
            }
        };

        debug!(%from, endpoint, video_id = %call.video_id(), "proxying backend call");
        match self.backend.call(&session_id, &call).await {
            Ok(response) => Reply::Api { response },
            Err(e) => {
                warn!(%from, endpoint, error = %e, "backend call failed");
                Reply::Error(ErrorPayload::new(failure_title(endpoint), e.to_string()))
            }
        }
    }
}

struct BackgroundHandler {
    settings: SettingsStore,
}

#[async_trait]
impl Handler for BackgroundHandler {
    async fn handle(&mut self, from: Address, message: Message) -> anyhow::Result<Reply> {
        match message {
            Message::GetSessionId => Ok(Reply::SessionId {
                session_id: self.settings.session_id().await?,
            }),
            other => {
                debug!(%from, kind = other.kind(), "background ignores message");
                Ok(Reply::Ack)
            }
        }
    }
}
