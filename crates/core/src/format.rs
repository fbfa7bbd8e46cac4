use crate::types::TranscriptSegment;

/// Format seconds as MM:SS timestamp
pub fn format_timestamp(seconds: f64) -> String {
    let seconds = seconds.max(0.0);
    let mins = (seconds / 60.0) as u32;
    let secs = (seconds % 60.0) as u32;
    format!("{:02}:{:02}", mins, secs)
}

/// Format seconds as HH:MM:SS, the clock shown in bookmark descriptions
pub fn format_clock(seconds: f64) -> String {
    if !seconds.is_finite() || seconds < 0.0 {
        return "00:00:00".to_string();
    }
    let total = seconds as u64;
    format!(
        "{:02}:{:02}:{:02}",
        (total / 3600) % 24,
        (total / 60) % 60,
        total % 60
    )
}

/// Parse a rendered `MM:SS` or `H:MM:SS` timestamp into seconds
pub fn parse_timestamp(text: &str) -> Option<f64> {
    let mut total: u64 = 0;
    let mut parts = 0;
    for part in text.trim().split(':') {
        let part = part.trim();
        if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        total = total.checked_mul(60)?.checked_add(part.parse().ok()?)?;
        parts += 1;
    }
    (2..=3).contains(&parts).then_some(total as f64)
}

/// Format transcript segments with timestamps, as sent to the model
pub fn format_transcript_with_timestamps(segments: &[TranscriptSegment]) -> String {
    if segments.is_empty() {
        return String::new();
    }

    let mut output = String::from("Video Transcript with Timestamps:\n\n");
    for seg in segments {
        output.push_str(&format!(
            "[{}] {}\n",
            format_timestamp(seg.start),
            seg.text.trim()
        ));
    }
    output
}

/// Find `[MM:SS]` references in assistant text and resolve them to seconds
pub fn find_timestamp_links(text: &str) -> Vec<(String, f64)> {
    let mut links = Vec::new();
    let mut rest = text;
    while let Some(open) = rest.find('[') {
        let after = &rest[open + 1..];
        let Some(close) = after.find(']') else {
            break;
        };
        let inner = &after[..close];
        let is_mm_ss = inner.len() == 5
            && inner.as_bytes()[2] == b':'
            && inner.bytes().enumerate().all(|(i, b)| i == 2 || b.is_ascii_digit());
        if is_mm_ss {
            if let Some(seconds) = parse_timestamp(inner) {
                links.push((format!("[{inner}]"), seconds));
            }
        }
        rest = &after[close + 1..];
    }
    links
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(0.0), "00:00");
        assert_eq!(format_timestamp(75.9), "01:15");
    }

    #[test]
    fn test_format_clock() {
        assert_eq!(format_clock(42.5), "00:00:42");
        assert_eq!(format_clock(3723.0), "01:02:03");
        assert_eq!(format_clock(f64::NAN), "00:00:00");
    }

    #[test]
    fn test_parse_timestamp() {
        assert_eq!(parse_timestamp("00:10"), Some(10.0));
        assert_eq!(parse_timestamp(" 2:05 "), Some(125.0));
        assert_eq!(parse_timestamp("1:00:01"), Some(3601.0));
        assert_eq!(parse_timestamp("10"), None);
        assert_eq!(parse_timestamp("aa:bb"), None);
        assert_eq!(parse_timestamp("1::2"), None);
    }

    #[test]
    fn test_format_transcript() {
        let segments = vec![
            TranscriptSegment {
                text: " intro ".to_string(),
                start: 0.0,
                duration: 5.0,
            },
            TranscriptSegment {
                text: "setup".to_string(),
                start: 65.0,
                duration: 5.0,
            },
        ];
        assert_eq!(
            format_transcript_with_timestamps(&segments),
            "Video Transcript with Timestamps:\n\n[00:00] intro\n[01:05] setup\n"
        );
        assert_eq!(format_transcript_with_timestamps(&[]), "");
    }

    #[test]
    fn test_find_timestamp_links() {
        let links = find_timestamp_links("See [01:30] and [00:05], not [1:2] or [ab:cd].");
        assert_eq!(
            links,
            vec![("[01:30]".to_string(), 90.0), ("[00:05]".to_string(), 5.0)]
        );
    }
}
