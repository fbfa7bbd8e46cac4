use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
};

use tokio::sync::Notify;

/// Bounded FIFO shared between any number of producers and one consumer.
/// When full, the oldest entry is evicted and handed back to the producer.
pub struct FifoDropOldestQueue<T> {
    inner: Arc<FifoDropOldestInner<T>>,
}

struct FifoDropOldestInner<T> {
    buf: Mutex<VecDeque<T>>,
    capacity: usize,
    notify: Notify,
}

pub struct FifoDropOldestReceiver<T> {
    inner: Arc<FifoDropOldestInner<T>>,
}

impl<T> Clone for FifoDropOldestQueue<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> FifoDropOldestQueue<T> {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0);

        Self {
            inner: Arc::new(FifoDropOldestInner {
                buf: Mutex::new(VecDeque::with_capacity(capacity)),
                capacity,
                notify: Notify::new(),
            }),
        }
    }

    /// Appends `value`, returning the entry evicted to make room, if any.
    pub fn push_overwrite(&self, value: T) -> Option<T> {
        let mut buf = self.inner.buf.lock().expect("FifoDropOldestQueue poisoned");
        let evicted = if buf.len() >= self.inner.capacity {
            buf.pop_front()
        } else {
            None
        };
        buf.push_back(value);
        drop(buf);
        self.inner.notify.notify_one();
        evicted
    }

    pub fn receiver(&self) -> FifoDropOldestReceiver<T> {
        FifoDropOldestReceiver {
            inner: self.inner.clone(),
        }
    }
}

impl<T> FifoDropOldestReceiver<T> {
    pub fn try_recv(&self) -> Option<T> {
        self.inner
            .buf
            .lock()
            .expect("FifoDropOldestQueue poisoned")
            .pop_front()
    }

    pub async fn recv(&self) -> T {
        loop {
            if let Some(value) = self.try_recv() {
                return value;
            }
            self.inner.notify.notified().await;
        }
    }

    /// Removes everything still queued.
    pub fn drain(&self) -> Vec<T> {
        self.inner
            .buf
            .lock()
            .expect("FifoDropOldestQueue poisoned")
            .drain(..)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fifo_order() {
        let q = FifoDropOldestQueue::new(4);
        let rx = q.receiver();
        q.push_overwrite(1);
        q.push_overwrite(2);
        assert_eq!(rx.try_recv(), Some(1));
        assert_eq!(rx.try_recv(), Some(2));
        assert_eq!(rx.try_recv(), None);
    }

    #[test]
    fn test_overflow_evicts_oldest() {
        let q = FifoDropOldestQueue::new(2);
        assert_eq!(q.push_overwrite(1), None);
        assert_eq!(q.push_overwrite(2), None);
        assert_eq!(q.push_overwrite(3), Some(1));
        assert_eq!(q.receiver().drain(), vec![2, 3]);
    }

    #[tokio::test]
    async fn test_recv_wakes_on_push() {
        let q = FifoDropOldestQueue::new(2);
        let rx = q.receiver();
        let handle = tokio::spawn(async move { rx.recv().await });
        tokio::task::yield_now().await;
        q.push_overwrite("hello");
        assert_eq!(handle.await.unwrap(), "hello");
    }
}
