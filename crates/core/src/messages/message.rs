use serde::{Deserialize, Serialize};

use crate::{
    assistant::ApiCall,
    types::{Difficulty, QuizQuestion, TranscriptSegment},
    video::VideoId,
};

/// How a message kind travels through the router.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Best effort; dropped if the receiver is not attached.
    Event,
    /// Sender awaits exactly one [`Reply`](super::Reply) or a delivery failure.
    Request,
}

/// Every message exchanged between Background, Content and Panel.
///
/// On the wire this is `{ "type": "KIND", ...fields }` with camelCase fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum Message {
    NewVideo {
        video_id: VideoId,
    },
    Play {
        value: f64,
    },
    Delete {
        value: f64,
    },
    GetTranscript,
    TranscriptLoading,
    TranscriptReady {
        transcript: Vec<TranscriptSegment>,
    },
    ChatRequest {
        message: String,
    },
    ChatLoading,
    ChatResponse {
        message: String,
        #[serde(default)]
        timestamps: Vec<f64>,
    },
    SummaryRequest,
    SummaryLoading,
    SummaryResponse {
        summary: String,
        key_points: Vec<String>,
    },
    QuizRequest {
        num_questions: u32,
        #[serde(default)]
        difficulty: Difficulty,
    },
    QuizLoading,
    QuizResponse {
        questions: Vec<QuizQuestion>,
    },
    SeekVideo {
        timestamp: f64,
    },
    Error {
        error: String,
        message: String,
    },
    VideoInfo {
        video_id: Option<VideoId>,
    },
    CloseSidebar,
    /// Panel finished loading and can receive events.
    PanelReady,
    /// Backend call proxied by Background, which owns network side effects.
    ApiRequest {
        call: ApiCall,
    },
    GetSessionId,
}

impl Message {
    pub fn delivery(&self) -> Delivery {
        match self {
            Message::Delete { .. } | Message::ApiRequest { .. } | Message::GetSessionId => {
                Delivery::Request
            }
            Message::NewVideo { .. }
            | Message::Play { .. }
            | Message::GetTranscript
            | Message::TranscriptLoading
            | Message::TranscriptReady { .. }
            | Message::ChatRequest { .. }
            | Message::ChatLoading
            | Message::ChatResponse { .. }
            | Message::SummaryRequest
            | Message::SummaryLoading
            | Message::SummaryResponse { .. }
            | Message::QuizRequest { .. }
            | Message::QuizLoading
            | Message::QuizResponse { .. }
            | Message::SeekVideo { .. }
            | Message::Error { .. }
            | Message::VideoInfo { .. }
            | Message::CloseSidebar
            | Message::PanelReady => Delivery::Event,
        }
    }

    /// The wire discriminant, for logs and error payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            Message::NewVideo { .. } => "NEW_VIDEO",
            Message::Play { .. } => "PLAY",
            Message::Delete { .. } => "DELETE",
            Message::GetTranscript => "GET_TRANSCRIPT",
            Message::TranscriptLoading => "TRANSCRIPT_LOADING",
            Message::TranscriptReady { .. } => "TRANSCRIPT_READY",
            Message::ChatRequest { .. } => "CHAT_REQUEST",
            Message::ChatLoading => "CHAT_LOADING",
            Message::ChatResponse { .. } => "CHAT_RESPONSE",
            Message::SummaryRequest => "SUMMARY_REQUEST",
            Message::SummaryLoading => "SUMMARY_LOADING",
            Message::SummaryResponse { .. } => "SUMMARY_RESPONSE",
            Message::QuizRequest { .. } => "QUIZ_REQUEST",
            Message::QuizLoading => "QUIZ_LOADING",
            Message::QuizResponse { .. } => "QUIZ_RESPONSE",
            Message::SeekVideo { .. } => "SEEK_VIDEO",
            Message::Error { .. } => "ERROR",
            Message::VideoInfo { .. } => "VIDEO_INFO",
            Message::CloseSidebar => "CLOSE_SIDEBAR",
            Message::PanelReady => "PANEL_READY",
            Message::ApiRequest { .. } => "API_REQUEST",
            Message::GetSessionId => "GET_SESSION_ID",
        }
    }

    pub fn error(error: impl Into<String>, message: impl Into<String>) -> Self {
        Message::Error {
            error: error.into(),
            message: message.into(),
        }
    }
}
