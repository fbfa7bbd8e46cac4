use serde::{Deserialize, Serialize};

use crate::{assistant::ApiResponse, bookmarks::Bookmark};

/// User-facing failure: a short title plus an explanation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{error}: {message}")]
pub struct ErrorPayload {
    pub error: String,
    pub message: String,
}

impl ErrorPayload {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
        }
    }
}

/// The single answer to a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Reply {
    Ack,
    Bookmarks { bookmarks: Vec<Bookmark> },
    SessionId { session_id: String },
    Api { response: ApiResponse },
    Error(ErrorPayload),
}

impl Reply {
    /// Turns an error reply into `Err`, so callers can use `?`.
    pub fn into_result(self) -> Result<Reply, ErrorPayload> {
        match self {
            Reply::Error(payload) => Err(payload),
            other => Ok(other),
        }
    }
}
