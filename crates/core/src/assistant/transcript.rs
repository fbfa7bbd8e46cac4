//! In-page transcript extraction: turns the rows of a rendered transcript
//! panel into timed segments.

use thiserror::Error;

use crate::{format::parse_timestamp, types::TranscriptSegment};

/// Duration given to the final entry, which has no successor to measure against.
pub const LAST_SEGMENT_DURATION: f64 = 5.0;

/// One row as the host page renders it, e.g. `("1:05", "welcome back")`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedCue {
    pub timestamp: String,
    pub text: String,
}

impl RenderedCue {
    pub fn new(timestamp: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            timestamp: timestamp.into(),
            text: text.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("unreadable timestamp {timestamp:?} in transcript row {row}")]
    BadTimestamp { row: usize, timestamp: String },
}

/// Parses rendered rows into segments. Each entry lasts until the next one
/// starts (never negative); the last one lasts [`LAST_SEGMENT_DURATION`].
///
/// An empty result means the page had nothing to offer and the caller should
/// ask the backend instead.
pub fn segments_from_rendered(
    cues: &[RenderedCue],
) -> Result<Vec<TranscriptSegment>, ExtractionError> {
    let starts = cues
        .iter()
        .enumerate()
        .map(|(row, cue)| {
            parse_timestamp(&cue.timestamp).ok_or_else(|| ExtractionError::BadTimestamp {
                row,
                timestamp: cue.timestamp.clone(),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(cues
        .iter()
        .zip(&starts)
        .enumerate()
        .map(|(i, (cue, &start))| {
            let duration = match starts.get(i + 1) {
                Some(next) => (next - start).max(0.0),
                None => LAST_SEGMENT_DURATION,
            };
            TranscriptSegment {
                text: cue.text.trim().to_string(),
                start,
                duration,
            }
        })
        .collect())
}
