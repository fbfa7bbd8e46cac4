//! The three execution contexts of a tab and the host capabilities they
//! run against.

pub mod background;
pub mod content;
pub mod host;
pub mod panel;

pub use background::Background;
pub use content::{Content, ContentAction, ContentHandle};
pub use host::HostPage;
pub use panel::{
    ChatLine, GradedQuiz, Panel, PanelHandle, PanelState, TRANSCRIPT_NOT_READY, TimestampLink,
};

/// User-facing title for a failed assistant call.
pub fn failure_title(endpoint: &str) -> &'static str {
    match endpoint {
        "fetch-transcript" => "Failed to get transcript",
        "chat" => "Chat request failed",
        "summary" => "Summary request failed",
        "quiz" => "Quiz request failed",
        _ => "Request failed",
    }
}
