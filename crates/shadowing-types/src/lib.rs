use std::sync::OnceLock;

use regex::Regex;

/// The 11-character YouTube video identifier.
///
/// NOTE: Ids are assigned by YouTube; we never mint one locally.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct VideoId(pub String);

impl VideoId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn watch_url(&self) -> String {
        format!("https://www.youtube.com/watch?v={}", self.0)
    }
}

impl std::fmt::Display for VideoId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

fn youtube_url_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        // Standard (`youtube.com/watch?v=`) and short (`youtu.be/`) forms, protocol optional.
        Regex::new(r"(?:https?://)?(?:www\.)?(?:youtube\.com/watch\?v=|youtu\.be/)([A-Za-z0-9_-]{11})")
            .unwrap_or_else(|e| panic!("invalid youtube url pattern: {e}"))
    })
}

/// Pull the video id out of a standard or short YouTube URL.
///
/// Returns `None` for anything that does not look like one, including the empty string.
pub fn extract_video_id(url: &str) -> Option<VideoId> {
    youtube_url_pattern()
        .captures(url)
        .and_then(|c| c.get(1))
        .map(|m| VideoId(m.as_str().to_string()))
}

/// Round to two decimal places, the precision transcripts are stored at.
pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// One timed line of a transcript. Times are seconds.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TranscriptSegment {
    pub start: f64,
    pub duration: f64,
    pub text: String,
}

impl TranscriptSegment {
    pub fn new(start: f64, duration: f64, text: impl Into<String>) -> Self {
        Self {
            start: round2(start),
            duration: round2(duration),
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct VideoMetadata {
    pub title: String,
    /// Whole seconds.
    pub duration: i64,
    pub thumbnail: Option<String>,
}
