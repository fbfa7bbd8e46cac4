use std::{
    path::Path,
    sync::{Arc, Mutex},
};

use anyhow::{Context, Result, bail};
use console::style;
use tokio::{sync::broadcast, task::JoinHandle, time::Instant};
use tubemark_core::{
    Background, Bookmark, BookmarkRenderer, BookmarkStore, Content, ContentHandle, HostPage,
    KeyValueStore, Panel, PanelHandle, Router, SettingsStore, TabId, VideoBackend, VideoId,
    assistant::RenderedCue,
    format_timestamp,
    video::{ChannelNavigation, NavigationSender},
};

pub const TAB: TabId = TabId(1);

struct Playback {
    anchor: Instant,
    offset: f64,
    playing: bool,
}

/// Stand-in for the watch page: a player clock, an optional caption panel
/// and a sidebar flag.
pub struct SimulatedPage {
    playback: Mutex<Playback>,
    captions: Vec<RenderedCue>,
    sidebar: Mutex<bool>,
}

impl SimulatedPage {
    pub fn new(captions: Vec<RenderedCue>) -> Self {
        Self {
            playback: Mutex::new(Playback {
                anchor: Instant::now(),
                offset: 0.0,
                playing: true,
            }),
            captions,
            sidebar: Mutex::new(false),
        }
    }

    pub fn pause(&self) {
        let now = self.current_time();
        let mut playback = self.playback.lock().expect("SimulatedPage poisoned");
        playback.offset = now;
        playback.playing = false;
    }

    pub fn sidebar_visible(&self) -> bool {
        *self.sidebar.lock().expect("SimulatedPage poisoned")
    }
}

impl BookmarkRenderer for SimulatedPage {
    fn bookmarks_changed(&self, video_id: &VideoId, bookmarks: &[Bookmark]) {
        println!(
            "{} {} bookmark(s) for {}",
            style("▸").cyan(),
            bookmarks.len(),
            style(video_id).yellow()
        );
        for b in bookmarks {
            println!(
                "    {} {}",
                style(format!("[{}]", format_timestamp(b.time))).cyan(),
                b.description
            );
        }
    }
}

impl HostPage for SimulatedPage {
    fn current_time(&self) -> f64 {
        let playback = self.playback.lock().expect("SimulatedPage poisoned");
        if playback.playing {
            playback.offset + playback.anchor.elapsed().as_secs_f64()
        } else {
            playback.offset
        }
    }

    fn seek(&self, seconds: f64) {
        let mut playback = self.playback.lock().expect("SimulatedPage poisoned");
        playback.offset = seconds;
        playback.anchor = Instant::now();
        println!(
            "{} seeked to {}",
            style("▸").cyan(),
            style(format_timestamp(seconds)).cyan()
        );
    }

    fn rendered_transcript(&self) -> Vec<RenderedCue> {
        self.captions.clone()
    }

    fn attach_bookmark_button(&self) -> bool {
        true
    }

    fn set_sidebar_visible(&self, visible: bool) {
        *self.sidebar.lock().expect("SimulatedPage poisoned") = visible;
    }
}

/// Reads a caption file: one `MM:SS text` (or `H:MM:SS text`) cue per line.
pub fn parse_captions(raw: &str) -> Result<Vec<RenderedCue>> {
    raw.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(n, line)| {
            let Some((timestamp, text)) = line.trim().split_once(char::is_whitespace) else {
                bail!("line {}: expected `MM:SS text`", n + 1);
            };
            Ok(RenderedCue::new(timestamp, text.trim()))
        })
        .collect()
}

pub async fn load_captions(path: &Path) -> Result<Vec<RenderedCue>> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read captions from {}", path.display()))?;
    parse_captions(&raw)
}

/// One browser tab: Background plus this tab's Content, with the Panel
/// opened on demand.
pub struct TabHandle {
    pub router: Router,
    pub background: Background,
    pub nav: NavigationSender,
    pub content: ContentHandle,
    pub page: Arc<SimulatedPage>,
    pub bookmarks: BookmarkStore,
    panel: Option<(PanelHandle, JoinHandle<()>)>,
    pub shutdown_tx: broadcast::Sender<()>,
}

pub fn open_tab(
    url: &str,
    store: Arc<dyn KeyValueStore>,
    backend: Arc<dyn VideoBackend>,
    captions: Vec<RenderedCue>,
) -> TabHandle {
    let (shutdown_tx, shutdown_rx) = broadcast::channel::<()>(1);
    let router = Router::default();
    let settings = SettingsStore::new(store.clone());
    let page = Arc::new(SimulatedPage::new(captions));

    let background = Background::new(router.clone(), backend, settings.clone());
    background.clone().spawn(shutdown_rx.resubscribe());

    let (nav, observer) = ChannelNavigation::new(url);
    let bookmarks = BookmarkStore::new(store).with_renderer(page.clone());
    let (content, _) = Content::spawn(
        TAB,
        router.clone(),
        page.clone(),
        bookmarks.clone(),
        settings,
        observer,
        shutdown_rx.resubscribe(),
    );

    TabHandle {
        router,
        background,
        nav,
        content,
        page,
        bookmarks,
        panel: None,
        shutdown_tx,
    }
}

impl TabHandle {
    pub fn navigate(&self, url: &str) {
        self.nav.navigate(url);
        self.background.tab_updated(TAB, url);
    }

    pub fn current_video(&self) -> Option<VideoId> {
        VideoId::from_url(&self.nav.current_url())
    }

    /// The open panel, opening the sidebar first if needed.
    pub async fn panel(&mut self) -> Result<&PanelHandle> {
        if self.panel.is_none() {
            if !self.page.sidebar_visible() {
                self.content.toggle_sidebar().await?;
            }
            let opened = Panel::spawn(TAB, self.router.clone(), self.shutdown_tx.subscribe());
            self.panel = Some(opened);
        }
        self.panel
            .as_ref()
            .map(|(panel, _)| panel)
            .context("panel closed")
    }

    pub fn close_panel(&mut self) {
        if let Some((panel, task)) = self.panel.take() {
            panel.close();
            task.abort();
        }
    }

    pub fn open_panel(&self) -> Option<&PanelHandle> {
        self.panel.as_ref().map(|(panel, _)| panel)
    }

    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_parse_captions() {
        let cues = parse_captions("00:10 Hello there\n\n1:02:03   Much later \n").unwrap();
        assert_eq!(
            cues,
            vec![
                RenderedCue::new("00:10", "Hello there"),
                RenderedCue::new("1:02:03", "Much later"),
            ]
        );
        assert!(parse_captions("nonsense").is_err());
    }

    #[tokio::test]
    async fn test_load_captions_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "00:05 first").unwrap();
        writeln!(file, "00:09 second").unwrap();

        let cues = load_captions(file.path()).await.unwrap();
        assert_eq!(cues.len(), 2);
        assert_eq!(cues[1], RenderedCue::new("00:09", "second"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_page_clock_follows_seek_and_pause() {
        let page = SimulatedPage::new(vec![]);
        page.seek(30.0);
        tokio::time::advance(std::time::Duration::from_secs(5)).await;
        assert_eq!(page.current_time(), 35.0);

        page.pause();
        tokio::time::advance(std::time::Duration::from_secs(5)).await;
        assert_eq!(page.current_time(), 35.0);
    }
}
