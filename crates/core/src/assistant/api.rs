use serde::{Deserialize, Serialize};

use crate::{
    types::{ChatTurn, Difficulty, QuizQuestion, TranscriptSegment},
    video::VideoId,
};

pub const DEFAULT_QUIZ_QUESTIONS: u32 = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoRequest {
    pub video_id: VideoId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcript: Option<Vec<TranscriptSegment>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub video_id: VideoId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcript: Option<Vec<TranscriptSegment>>,
    pub message: String,
    pub chat_history: Vec<ChatTurn>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizRequest {
    pub video_id: VideoId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcript: Option<Vec<TranscriptSegment>>,
    pub num_questions: u32,
    pub difficulty: Difficulty,
}

/// One backend call; the variant picks the `/video/{endpoint}` route and the
/// inner struct is the JSON body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "endpoint", rename_all = "kebab-case")]
pub enum ApiCall {
    FetchTranscript(VideoRequest),
    Chat(ChatRequest),
    Summary(VideoRequest),
    Quiz(QuizRequest),
}

impl ApiCall {
    pub fn endpoint(&self) -> &'static str {
        match self {
            ApiCall::FetchTranscript(_) => "fetch-transcript",
            ApiCall::Chat(_) => "chat",
            ApiCall::Summary(_) => "summary",
            ApiCall::Quiz(_) => "quiz",
        }
    }

    pub fn video_id(&self) -> &VideoId {
        match self {
            ApiCall::FetchTranscript(r) | ApiCall::Summary(r) => &r.video_id,
            ApiCall::Chat(r) => &r.video_id,
            ApiCall::Quiz(r) => &r.video_id,
        }
    }

    pub fn transcript(&self) -> Option<&[TranscriptSegment]> {
        match self {
            ApiCall::FetchTranscript(r) | ApiCall::Summary(r) => r.transcript.as_deref(),
            ApiCall::Chat(r) => r.transcript.as_deref(),
            ApiCall::Quiz(r) => r.transcript.as_deref(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptResponse {
    pub transcript: Vec<TranscriptSegment>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
    #[serde(default)]
    pub relevant_timestamps: Option<Vec<f64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryResponse {
    pub summary: String,
    pub key_points: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizResponse {
    pub questions: Vec<QuizQuestion>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "endpoint", rename_all = "kebab-case")]
pub enum ApiResponse {
    FetchTranscript(TranscriptResponse),
    Chat(ChatResponse),
    Summary(SummaryResponse),
    Quiz(QuizResponse),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_body_shape() {
        let call = ApiCall::Quiz(QuizRequest {
            video_id: VideoId::parse("abc").unwrap(),
            transcript: None,
            num_questions: DEFAULT_QUIZ_QUESTIONS,
            difficulty: Difficulty::Hard,
        });
        assert_eq!(call.endpoint(), "quiz");
        let ApiCall::Quiz(body) = &call else {
            unreachable!()
        };
        assert_eq!(
            serde_json::to_value(body).unwrap(),
            json!({"video_id": "abc", "num_questions": 5, "difficulty": "hard"})
        );
    }

    #[test]
    fn test_chat_response_tolerates_null_timestamps() {
        let parsed: ChatResponse =
            serde_json::from_value(json!({"response": "hi", "relevant_timestamps": null}))
                .unwrap();
        assert_eq!(parsed.relevant_timestamps, None);
    }
}
