use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};
use tracing::debug;

use super::VideoId;

/// Quiet window that closes a burst of navigation notifications.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(150);

/// Host capability: "tell me when the logical page may have changed".
///
/// Notifications may be spurious and bursty (title and DOM mutations fire
/// several times per navigation); the tracker deduplicates and debounces them.
#[async_trait]
pub trait NavigationObserver: Send {
    fn current_url(&self) -> String;

    /// Returns `false` once the page is gone and no further notifications will come.
    async fn changed(&mut self) -> bool;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityChange {
    pub previous: Option<VideoId>,
    pub current: Option<VideoId>,
}

/// Remembers the current identity and reports only real transitions.
#[derive(Debug, Default)]
pub struct IdentityLatch {
    current: Option<VideoId>,
}

impl IdentityLatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<&VideoId> {
        self.current.as_ref()
    }

    pub fn observe(&mut self, next: Option<VideoId>) -> Option<IdentityChange> {
        if self.current == next {
            return None;
        }
        let previous = std::mem::replace(&mut self.current, next.clone());
        Some(IdentityChange {
            previous,
            current: next,
        })
    }
}

pub struct VideoContextTracker {
    latch: IdentityLatch,
    debounce: Duration,
}

impl Default for VideoContextTracker {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE)
    }
}

impl VideoContextTracker {
    pub fn new(debounce: Duration) -> Self {
        Self {
            latch: IdentityLatch::new(),
            debounce,
        }
    }

    /// Emits the initial identity (if the page qualifies), then one change per
    /// settled burst whose identity differs from the last one emitted.
    pub async fn run<O: NavigationObserver>(
        mut self,
        mut observer: O,
        changes: mpsc::Sender<IdentityChange>,
    ) {
        let initial = VideoId::from_url(&observer.current_url());
        if let Some(change) = self.latch.observe(initial) {
            if changes.send(change).await.is_err() {
                return;
            }
        }

        loop {
            if !observer.changed().await {
                return;
            }

            let mut page_gone = false;
            loop {
                match tokio::time::timeout(self.debounce, observer.changed()).await {
                    Ok(true) => continue,
                    Ok(false) => {
                        page_gone = true;
                        break;
                    }
                    Err(_) => break,
                }
            }

            let url = observer.current_url();
            match self.latch.observe(VideoId::from_url(&url)) {
                Some(change) => {
                    debug!(url = %url, previous = ?change.previous, current = ?change.current, "video identity changed");
                    if changes.send(change).await.is_err() {
                        return;
                    }
                }
                None => debug!(url = %url, "navigation burst settled without identity change"),
            }

            if page_gone {
                return;
            }
        }
    }
}

/// Observer fed by the host through a [`NavigationSender`].
pub struct ChannelNavigation {
    rx: watch::Receiver<String>,
}

#[derive(Clone)]
pub struct NavigationSender {
    tx: watch::Sender<String>,
}

impl ChannelNavigation {
    pub fn new(initial_url: impl Into<String>) -> (NavigationSender, ChannelNavigation) {
        let (tx, rx) = watch::channel(initial_url.into());
        (NavigationSender { tx }, ChannelNavigation { rx })
    }
}

impl NavigationSender {
    pub fn navigate(&self, url: impl Into<String>) {
        self.tx.send_replace(url.into());
    }

    /// A mutation that does not change the URL (title flicker, re-render).
    pub fn touch(&self) {
        self.tx.send_modify(|_| {});
    }

    pub fn current_url(&self) -> String {
        self.tx.borrow().clone()
    }
}

#[async_trait]
impl NavigationObserver for ChannelNavigation {
    fn current_url(&self) -> String {
        self.rx.borrow().clone()
    }

    async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(raw: &str) -> Option<VideoId> {
        VideoId::parse(raw)
    }

    #[test]
    fn test_latch_reports_each_transition_once() {
        let mut latch = IdentityLatch::new();
        assert_eq!(
            latch.observe(id("a")),
            Some(IdentityChange {
                previous: None,
                current: id("a")
            })
        );
        assert_eq!(latch.observe(id("a")), None);
        assert_eq!(
            latch.observe(None),
            Some(IdentityChange {
                previous: id("a"),
                current: None
            })
        );
        assert_eq!(latch.observe(None), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_initial_qualifying_page_fires_null_to_id() {
        let (_nav, observer) = ChannelNavigation::new("https://www.youtube.com/watch?v=abc123");
        let (tx, mut rx) = mpsc::channel(8);
        tokio::spawn(VideoContextTracker::default().run(observer, tx));

        let change = rx.recv().await.unwrap();
        assert_eq!(change.previous, None);
        assert_eq!(change.current, id("abc123"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_collapses_into_single_change() {
        let (nav, observer) = ChannelNavigation::new("https://www.youtube.com/");
        let (tx, mut rx) = mpsc::channel(8);
        tokio::spawn(VideoContextTracker::default().run(observer, tx));

        nav.navigate("https://www.youtube.com/watch?v=first");
        nav.touch();
        nav.navigate("https://www.youtube.com/watch?v=second");
        nav.touch();

        let change = rx.recv().await.unwrap();
        assert_eq!(change.previous, None);
        assert_eq!(change.current, id("second"));

        // Spurious mutations for the same page never fire.
        tokio::time::sleep(Duration::from_secs(1)).await;
        nav.touch();
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(rx.try_recv().is_err());

        nav.navigate("https://www.youtube.com/results?search_query=rust");
        let change = rx.recv().await.unwrap();
        assert_eq!(change.previous, id("second"));
        assert_eq!(change.current, None);
    }
}
