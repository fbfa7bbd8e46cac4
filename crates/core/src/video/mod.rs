mod tracker;

use std::fmt;

use reqwest::Url;
use serde::{Deserialize, Serialize};

pub use tracker::{
    ChannelNavigation, DEFAULT_DEBOUNCE, IdentityChange, IdentityLatch, NavigationObserver,
    NavigationSender, VideoContextTracker,
};

/// Identifier of the video a tab is showing, taken from the `v` query parameter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VideoId(String);

impl VideoId {
    /// Accepts only the characters a video id can contain.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        let valid = !raw.is_empty()
            && raw.len() <= 64
            && raw
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');
        valid.then(|| Self(raw.to_string()))
    }

    /// Derives the identity from a page URL. Anything that is not a watch page
    /// with a well-formed `v` parameter has no identity.
    pub fn from_url(url: &str) -> Option<Self> {
        let url = Url::parse(url).ok()?;
        if !is_youtube_host(&url) || url.path() != "/watch" {
            return None;
        }
        url.query_pairs()
            .find(|(k, _)| k == "v")
            .and_then(|(_, v)| Self::parse(&v))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn is_youtube_host(url: &Url) -> bool {
    match url.host_str() {
        Some(host) => host == "youtube.com" || host.ends_with(".youtube.com"),
        None => false,
    }
}

/// What the popup reports for the active tab.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageStatus {
    Active(VideoId),
    NotAVideoPage,
    NotOnYouTube,
}

impl PageStatus {
    pub fn from_url(url: &str) -> Self {
        if let Some(id) = VideoId::from_url(url) {
            return PageStatus::Active(id);
        }
        match Url::parse(url) {
            Ok(parsed) if is_youtube_host(&parsed) => PageStatus::NotAVideoPage,
            _ => PageStatus::NotOnYouTube,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            PageStatus::Active(_) => "Active",
            PageStatus::NotAVideoPage => "Not a video page",
            PageStatus::NotOnYouTube => "Not on YouTube",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_url() {
        let id = VideoId::from_url("https://www.youtube.com/watch?v=abc123&t=42s").unwrap();
        assert_eq!(id.as_str(), "abc123");
        assert_eq!(
            VideoId::from_url("https://m.youtube.com/watch?list=x&v=dQw4w9WgXcQ")
                .unwrap()
                .as_str(),
            "dQw4w9WgXcQ"
        );
    }

    #[test]
    fn test_missing_or_malformed_is_none() {
        assert_eq!(VideoId::from_url("https://www.youtube.com/watch"), None);
        assert_eq!(VideoId::from_url("https://www.youtube.com/watch?v="), None);
        assert_eq!(
            VideoId::from_url("https://www.youtube.com/watch?v=bad%20id"),
            None
        );
        assert_eq!(VideoId::from_url("https://www.youtube.com/feed?v=abc"), None);
        assert_eq!(VideoId::from_url("https://example.com/watch?v=abc"), None);
        assert_eq!(VideoId::from_url("not a url"), None);
    }

    #[test]
    fn test_page_status() {
        assert_eq!(
            PageStatus::from_url("https://www.youtube.com/watch?v=abc"),
            PageStatus::Active(VideoId::parse("abc").unwrap())
        );
        assert_eq!(
            PageStatus::from_url("https://www.youtube.com/").label(),
            "Not a video page"
        );
        assert_eq!(
            PageStatus::from_url("https://example.com/").label(),
            "Not on YouTube"
        );
    }
}
