use crate::{assistant::RenderedCue, bookmarks::BookmarkRenderer};

/// What the Content context needs from the page it is injected into.
///
/// Implementations wrap the real page (player, transcript panel, controls);
/// every call is synchronous and must not block.
pub trait HostPage: BookmarkRenderer {
    /// Playback position in seconds.
    fn current_time(&self) -> f64;

    fn seek(&self, seconds: f64);

    /// Rows of the page's own transcript panel; empty when it has none.
    fn rendered_transcript(&self) -> Vec<RenderedCue>;

    /// Places the "add bookmark" control. Returns `false` while the player
    /// controls have not rendered yet.
    fn attach_bookmark_button(&self) -> bool;

    fn set_sidebar_visible(&self, visible: bool);
}
