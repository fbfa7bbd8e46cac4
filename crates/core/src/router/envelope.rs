use tokio::sync::oneshot;

use crate::{
    messages::{Message, Reply},
    router::Address,
};

pub struct Envelope {
    pub seq: u64,
    pub from: Address,
    pub to: Address,
    pub message: Message,
    /// Present only for requests.
    pub reply: Option<Responder>,
}

/// One-shot reply slot. Consumed on send, so a request is answered at most once.
pub struct Responder {
    tx: oneshot::Sender<Reply>,
}

impl Responder {
    pub(crate) fn new(tx: oneshot::Sender<Reply>) -> Self {
        Self { tx }
    }

    pub fn send(self, reply: Reply) {
        // The requester may have given up; nothing to do then.
        let _ = self.tx.send(reply);
    }
}
