use std::panic::AssertUnwindSafe;

use async_trait::async_trait;
use futures::FutureExt;
use tokio::sync::broadcast;
use tracing::{error, warn};

use crate::{
    messages::{ErrorPayload, Message, Reply},
    queues::FifoDropOldestReceiver,
    router::{Address, Envelope, Router},
};

/// Message handling for one context.
///
/// Events ignore the returned [`Reply`]; requests get it (or, on `Err`/panic,
/// an error reply). Either way the endpoint keeps serving.
#[async_trait]
pub trait Handler: Send {
    async fn handle(&mut self, from: Address, message: Message) -> anyhow::Result<Reply>;
}

/// A context's attachment to the router. Dropping it detaches the context.
pub struct Endpoint {
    address: Address,
    generation: u64,
    router: Router,
    inbox: FifoDropOldestReceiver<Envelope>,
}

impl Endpoint {
    pub(crate) fn new(
        address: Address,
        generation: u64,
        router: Router,
        inbox: FifoDropOldestReceiver<Envelope>,
    ) -> Self {
        Self {
            address,
            generation,
            router,
            inbox,
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub async fn recv(&self) -> Envelope {
        self.inbox.recv().await
    }

    pub fn try_recv(&self) -> Option<Envelope> {
        self.inbox.try_recv()
    }

    /// Runs `handler` on one envelope and answers it if it is a request.
    pub async fn dispatch<H: Handler + ?Sized>(&self, handler: &mut H, envelope: Envelope) {
        let Envelope {
            seq,
            from,
            message,
            reply,
            ..
        } = envelope;
        let kind = message.kind();

        let outcome = AssertUnwindSafe(handler.handle(from, message))
            .catch_unwind()
            .await;

        let result = match outcome {
            Ok(Ok(reply)) => reply,
            Ok(Err(e)) => {
                warn!(address = %self.address, %from, kind, seq, error = %e, "handler failed");
                Reply::Error(ErrorPayload::new(format!("{kind} failed"), format!("{e:#}")))
            }
            Err(_) => {
                error!(address = %self.address, %from, kind, seq, "handler panicked");
                Reply::Error(ErrorPayload::new(
                    format!("{kind} failed"),
                    "internal error while handling the message",
                ))
            }
        };

        if let Some(responder) = reply {
            responder.send(result);
        }
    }

    /// Serves until `shutdown` fires (or its sender is dropped).
    pub async fn serve<H: Handler>(self, mut handler: H, mut shutdown: broadcast::Receiver<()>) {
        loop {
            tokio::select! {
                _ = shutdown.recv() => return,
                envelope = self.recv() => self.dispatch(&mut handler, envelope).await,
            }
        }
    }
}

impl Drop for Endpoint {
    fn drop(&mut self) {
        self.router.detach(self.address, self.generation);
    }
}
