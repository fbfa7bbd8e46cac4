use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex,
        atomic::{AtomicU64, Ordering},
    },
};

use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::{
    messages::{Delivery, Message, Reply},
    queues::FifoDropOldestQueue,
    router::{Address, DeliveryError, Endpoint, Envelope, Responder, can_route},
};

pub struct RouterConfig {
    pub inbox_capacity: usize,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self { inbox_capacity: 64 }
    }
}

#[derive(Default)]
pub struct RouterMetrics {
    pub dropped_events_total: AtomicU64,
    pub not_ready_requests_total: AtomicU64,
    pub evicted_total: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    pub dropped_events: u64,
    pub not_ready_requests: u64,
    pub evicted: u64,
}

impl RouterMetrics {
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            dropped_events: self.dropped_events_total.load(Ordering::Relaxed),
            not_ready_requests: self.not_ready_requests_total.load(Ordering::Relaxed),
            evicted: self.evicted_total.load(Ordering::Relaxed),
        }
    }
}

/// Outcome of a fire-and-forget send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Emitted {
    Queued,
    /// Receiver not attached; the event is gone.
    Dropped,
}

/// Typed message delivery between Background, Content and Panel.
///
/// Each attached context owns one FIFO inbox, so messages from one sender to
/// one receiver arrive in send order. Nothing is queued for a context that is
/// not attached: events are dropped, requests fail with
/// [`DeliveryError::NotReady`] before the call yields.
#[derive(Clone)]
pub struct Router {
    inner: Arc<RouterInner>,
}

struct RouterInner {
    inboxes: Mutex<HashMap<Address, Inbox>>,
    next_seq: AtomicU64,
    next_generation: AtomicU64,
    inbox_capacity: usize,
    metrics: RouterMetrics,
}

struct Inbox {
    generation: u64,
    queue: FifoDropOldestQueue<Envelope>,
}

impl Default for Router {
    fn default() -> Self {
        Self::new(RouterConfig::default())
    }
}

impl Router {
    pub fn new(cfg: RouterConfig) -> Self {
        Self {
            inner: Arc::new(RouterInner {
                inboxes: Mutex::new(HashMap::new()),
                next_seq: AtomicU64::new(0),
                next_generation: AtomicU64::new(0),
                inbox_capacity: cfg.inbox_capacity.max(1),
                metrics: RouterMetrics::default(),
            }),
        }
    }

    /// Registers the listener for `address`. Attaching an address that is
    /// already attached models a context restart: the previous instance stops
    /// receiving and whatever it had queued is discarded.
    pub fn attach(&self, address: Address) -> Endpoint {
        let generation = self.inner.next_generation.fetch_add(1, Ordering::Relaxed);
        let queue = FifoDropOldestQueue::new(self.inner.inbox_capacity);
        let receiver = queue.receiver();

        let previous = self
            .inner
            .inboxes
            .lock()
            .expect("Router poisoned")
            .insert(address, Inbox { generation, queue });

        match previous {
            Some(old) => {
                let discarded = old.queue.receiver().drain();
                info!(%address, discarded = discarded.len(), "context restarted");
            }
            None => info!(%address, "context attached"),
        }

        Endpoint::new(address, generation, self.clone(), receiver)
    }

    pub(crate) fn detach(&self, address: Address, generation: u64) {
        let removed = {
            let mut inboxes = self.inner.inboxes.lock().expect("Router poisoned");
            let current = inboxes
                .get(&address)
                .is_some_and(|inbox| inbox.generation == generation);
            if current {
                inboxes.remove(&address)
            } else {
                None
            }
        };

        if let Some(inbox) = removed {
            let discarded = inbox.queue.receiver().drain();
            info!(%address, discarded = discarded.len(), "context detached");
        }
    }

    pub fn is_attached(&self, address: Address) -> bool {
        self.inner
            .inboxes
            .lock()
            .expect("Router poisoned")
            .contains_key(&address)
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.inner.metrics.snapshot()
    }

    /// Fire-and-forget. Returns whether the event was queued or dropped.
    pub fn emit(
        &self,
        from: Address,
        to: Address,
        message: Message,
    ) -> Result<Emitted, DeliveryError> {
        check(from, to, &message, Delivery::Event)?;
        let kind = message.kind();

        match self.enqueue(from, to, message, None) {
            Ok(()) => Ok(Emitted::Queued),
            Err(_) => {
                self.inner
                    .metrics
                    .dropped_events_total
                    .fetch_add(1, Ordering::Relaxed);
                debug!(%from, %to, kind, "event dropped, receiver not attached");
                Ok(Emitted::Dropped)
            }
        }
    }

    /// Sends a request and waits for its single reply.
    pub async fn request(
        &self,
        from: Address,
        to: Address,
        message: Message,
    ) -> Result<Reply, DeliveryError> {
        check(from, to, &message, Delivery::Request)?;
        let kind = message.kind();
        let (tx, rx) = oneshot::channel();

        if self
            .enqueue(from, to, message, Some(Responder::new(tx)))
            .is_err()
        {
            self.inner
                .metrics
                .not_ready_requests_total
                .fetch_add(1, Ordering::Relaxed);
            debug!(%from, %to, kind, "request refused, receiver not attached");
            return Err(DeliveryError::NotReady { to });
        }

        rx.await.map_err(|_| DeliveryError::Dropped { to, kind })
    }

    fn enqueue(
        &self,
        from: Address,
        to: Address,
        message: Message,
        reply: Option<Responder>,
    ) -> Result<(), ()> {
        let seq = self.inner.next_seq.fetch_add(1, Ordering::Relaxed);
        let inboxes = self.inner.inboxes.lock().expect("Router poisoned");
        let Some(inbox) = inboxes.get(&to) else {
            return Err(());
        };

        let evicted = inbox.queue.push_overwrite(Envelope {
            seq,
            from,
            to,
            message,
            reply,
        });
        drop(inboxes);

        if let Some(evicted) = evicted {
            self.inner
                .metrics
                .evicted_total
                .fetch_add(1, Ordering::Relaxed);
            warn!(
                %to,
                kind = evicted.message.kind(),
                seq = evicted.seq,
                "inbox full, oldest message evicted"
            );
        }
        Ok(())
    }
}

fn check(
    from: Address,
    to: Address,
    message: &Message,
    expected: Delivery,
) -> Result<(), DeliveryError> {
    if !can_route(from, to) {
        return Err(DeliveryError::NoRoute { from, to });
    }
    if message.delivery() != expected {
        return Err(DeliveryError::WrongDelivery {
            kind: message.kind(),
            expected: message.delivery(),
        });
    }
    Ok(())
}
