use std::{collections::HashMap, sync::Mutex, time::Duration};

use async_trait::async_trait;
use tracing::debug;

use crate::{
    assistant::{
        ApiCall, ApiResponse, BackendError, ChatResponse, QuizResponse, SummaryResponse,
        TranscriptResponse, VideoBackend,
    },
    format::format_timestamp,
    types::{Difficulty, QuizQuestion, TranscriptSegment},
    video::VideoId,
};

const NOT_AVAILABLE: &str = "Transcript not available for this video";
const MAX_KEY_POINTS: usize = 5;
const MAX_CHAT_MATCHES: usize = 3;

/// Offline backend. Answers are derived from the transcript text alone, so
/// they are deterministic and need no API key.
#[derive(Default)]
pub struct StubBackend {
    transcripts: Mutex<HashMap<VideoId, Vec<TranscriptSegment>>>,
    latency: Option<Duration>,
}

impl StubBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every call, so loading states are observable.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn with_transcript(self, video_id: VideoId, segments: Vec<TranscriptSegment>) -> Self {
        self.insert_transcript(video_id, segments);
        self
    }

    pub fn insert_transcript(&self, video_id: VideoId, segments: Vec<TranscriptSegment>) {
        self.transcripts
            .lock()
            .expect("StubBackend poisoned")
            .insert(video_id, segments);
    }

    fn known_transcript(&self, video_id: &VideoId) -> Option<Vec<TranscriptSegment>> {
        self.transcripts
            .lock()
            .expect("StubBackend poisoned")
            .get(video_id)
            .cloned()
    }

    fn transcript_for(&self, call: &ApiCall) -> Result<Vec<TranscriptSegment>, BackendError> {
        call.transcript()
            .map(<[TranscriptSegment]>::to_vec)
            .or_else(|| self.known_transcript(call.video_id()))
            .filter(|segments| !segments.is_empty())
            .ok_or_else(|| BackendError::Status {
                status: 404,
                detail: NOT_AVAILABLE.to_string(),
            })
    }
}

#[async_trait]
impl VideoBackend for StubBackend {
    async fn call(&self, session_id: &str, call: &ApiCall) -> Result<ApiResponse, BackendError> {
        debug!(
            session_id,
            endpoint = call.endpoint(),
            video_id = %call.video_id(),
            "stub backend call"
        );
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let transcript = self.transcript_for(call)?;
        Ok(match call {
            ApiCall::FetchTranscript(_) => {
                ApiResponse::FetchTranscript(TranscriptResponse { transcript })
            }
            ApiCall::Chat(req) => ApiResponse::Chat(answer(&transcript, &req.message)),
            ApiCall::Summary(_) => ApiResponse::Summary(summarize(&transcript)),
            ApiCall::Quiz(req) => ApiResponse::Quiz(QuizResponse {
                questions: make_quiz(&transcript, req.num_questions as usize, req.difficulty),
            }),
        })
    }
}

fn line(segment: &TranscriptSegment) -> String {
    format!("[{}] {}", format_timestamp(segment.start), segment.text.trim())
}

/// Indices of `count` segments spread evenly over the transcript.
fn spread(len: usize, count: usize) -> Vec<usize> {
    let count = count.min(len);
    (0..count).map(|i| i * len / count).collect()
}

fn answer(transcript: &[TranscriptSegment], message: &str) -> ChatResponse {
    let words: Vec<String> = message
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() > 3)
        .map(str::to_lowercase)
        .collect();

    let mut scored: Vec<(usize, &TranscriptSegment)> = transcript
        .iter()
        .map(|seg| {
            let text = seg.text.to_lowercase();
            (words.iter().filter(|w| text.contains(w.as_str())).count(), seg)
        })
        .filter(|(score, _)| *score > 0)
        .collect();
    scored.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.start.total_cmp(&b.1.start)));

    let mut hits: Vec<&TranscriptSegment> = scored
        .into_iter()
        .take(MAX_CHAT_MATCHES)
        .map(|(_, seg)| seg)
        .collect();
    if hits.is_empty() {
        hits.extend(transcript.first());
    }
    hits.sort_by(|a, b| a.start.total_cmp(&b.start));

    let mut response = String::from("Here is what the video says about that:\n");
    for seg in &hits {
        response.push_str(&line(seg));
        response.push('\n');
    }

    ChatResponse {
        response: response.trim_end().to_string(),
        relevant_timestamps: Some(hits.iter().map(|s| s.start).collect()),
    }
}

fn summarize(transcript: &[TranscriptSegment]) -> SummaryResponse {
    let summary = transcript
        .iter()
        .take(3)
        .map(|s| s.text.trim())
        .collect::<Vec<_>>()
        .join(" ");
    let key_points = spread(transcript.len(), MAX_KEY_POINTS)
        .into_iter()
        .map(|i| line(&transcript[i]))
        .collect();

    SummaryResponse {
        summary,
        key_points,
    }
}

fn make_quiz(
    transcript: &[TranscriptSegment],
    num_questions: usize,
    difficulty: Difficulty,
) -> Vec<QuizQuestion> {
    let option_count = match difficulty {
        Difficulty::Easy => 2,
        Difficulty::Medium => 3,
        Difficulty::Hard => 4,
    }
    .min(transcript.len());

    spread(transcript.len(), num_questions)
        .into_iter()
        .enumerate()
        .map(|(n, idx)| {
            let seg = &transcript[idx];
            let mut options: Vec<String> = (1..option_count)
                .map(|k| transcript[(idx + k) % transcript.len()].text.trim().to_string())
                .collect();
            let correct_index = n % option_count;
            options.insert(correct_index, seg.text.trim().to_string());

            QuizQuestion {
                question: format!("What is said at [{}]?", format_timestamp(seg.start)),
                options,
                correct_index,
                explanation: format!("The transcript at {} reads that line.", line(seg)),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assistant::{ChatRequest, QuizRequest, VideoRequest};

    fn video() -> VideoId {
        VideoId::parse("abc123").unwrap()
    }

    fn transcript() -> Vec<TranscriptSegment> {
        [
            "Welcome to the talk",
            "Ownership moves values",
            "Borrowing lends them",
            "Lifetimes tie it together",
        ]
        .iter()
        .enumerate()
        .map(|(i, text)| TranscriptSegment {
            text: text.to_string(),
            start: i as f64 * 30.0,
            duration: 30.0,
        })
        .collect()
    }

    #[tokio::test]
    async fn test_unknown_video_has_no_transcript() {
        let backend = StubBackend::new();
        let call = ApiCall::FetchTranscript(VideoRequest {
            video_id: video(),
            transcript: None,
        });
        let err = backend.call("s", &call).await.unwrap_err();
        assert!(matches!(err, BackendError::Status { status: 404, .. }));
    }

    #[tokio::test]
    async fn test_chat_points_at_matching_segments() {
        let backend = StubBackend::new().with_transcript(video(), transcript());
        let call = ApiCall::Chat(ChatRequest {
            video_id: video(),
            transcript: None,
            message: "what about borrowing?".to_string(),
            chat_history: vec![],
        });
        let ApiResponse::Chat(chat) = backend.call("s", &call).await.unwrap() else {
            panic!("expected chat response");
        };
        assert_eq!(chat.relevant_timestamps, Some(vec![60.0]));
        assert!(chat.response.contains("[01:00] Borrowing lends them"));
    }

    #[tokio::test]
    async fn test_quiz_uses_request_transcript_and_is_answerable() {
        let backend = StubBackend::new();
        let call = ApiCall::Quiz(QuizRequest {
            video_id: video(),
            transcript: Some(transcript()),
            num_questions: 3,
            difficulty: Difficulty::Hard,
        });
        let ApiResponse::Quiz(quiz) = backend.call("s", &call).await.unwrap() else {
            panic!("expected quiz response");
        };
        assert_eq!(quiz.questions.len(), 3);
        for q in &quiz.questions {
            assert_eq!(q.options.len(), 4);
            assert!(q.correct_index < q.options.len());
        }
        assert_eq!(quiz.questions[0].options[0], "Welcome to the talk");
    }

    #[tokio::test]
    async fn test_summary_key_points_carry_timestamps() {
        let backend = StubBackend::new().with_transcript(video(), transcript());
        let call = ApiCall::Summary(VideoRequest {
            video_id: video(),
            transcript: None,
        });
        let ApiResponse::Summary(summary) = backend.call("s", &call).await.unwrap() else {
            panic!("expected summary response");
        };
        assert!(summary.summary.starts_with("Welcome to the talk"));
        assert_eq!(summary.key_points[0], "[00:00] Welcome to the talk");
        assert_eq!(summary.key_points.len(), 4);
    }
}
