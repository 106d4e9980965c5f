use std::{collections::HashMap, time::Duration};

use anyhow::Context;
use serde::Deserialize;
use shadowing_types::{TranscriptSegment, VideoId, VideoMetadata, round2};
use tokio::process::Command;

/// Upstream failure, tagged by which capability failed.
///
/// Metadata lookups only ever produce `VideoUnavailable`; transcript lookups only
/// ever produce `TranscriptUnavailable`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SourceError {
    #[error("video unavailable: {0}")]
    VideoUnavailable(String),
    #[error("transcript unavailable: {0}")]
    TranscriptUnavailable(String),
}

#[async_trait::async_trait]
pub trait VideoSource: Send + Sync {
    async fn fetch_metadata(&self, id: &VideoId) -> Result<VideoMetadata, SourceError>;

    async fn fetch_transcript(&self, id: &VideoId) -> Result<Vec<TranscriptSegment>, SourceError>;

    /// Metadata and transcript together, for sources that can share one upstream lookup.
    async fn fetch_video(
        &self,
        id: &VideoId,
    ) -> Result<(VideoMetadata, Vec<TranscriptSegment>), SourceError> {
        let metadata = self.fetch_metadata(id).await?;
        let transcript = self.fetch_transcript(id).await?;
        Ok((metadata, transcript))
    }
}

/// Resolves metadata and captions through the `yt-dlp` binary; caption bodies are
/// pulled over HTTP in YouTube's `json3` format.
pub struct YtDlpSource {
    bin: String,
    timeout: Duration,
    http: reqwest::Client,
}

impl YtDlpSource {
    pub fn new(bin: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("shadowing-control/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .context("build caption http client")?;
        Ok(Self {
            bin: bin.into(),
            timeout,
            http,
        })
    }

    async fn dump_info(&self, id: &VideoId) -> anyhow::Result<InfoDump> {
        let run = Command::new(&self.bin)
            .arg("--dump-single-json")
            .arg("--skip-download")
            .arg("--no-warnings")
            .arg(id.watch_url())
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(self.timeout, run)
            .await
            .map_err(|_| anyhow::anyhow!("{} timed out after {:?}", self.bin, self.timeout))?
            .with_context(|| format!("spawn {}", self.bin))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("{} exited with {}: {}", self.bin, output.status, stderr.trim());
        }

        serde_json::from_slice(&output.stdout).context("parse yt-dlp info JSON")
    }

    async fn download_captions(&self, url: &str) -> anyhow::Result<Json3> {
        self.http
            .get(url)
            .send()
            .await
            .context("fetch caption track")?
            .error_for_status()?
            .json()
            .await
            .context("parse caption track JSON")
    }

    async fn transcript_from_info(
        &self,
        id: &VideoId,
        info: &InfoDump,
    ) -> Result<Vec<TranscriptSegment>, SourceError> {
        let url = english_track_url(info).ok_or_else(|| {
            SourceError::TranscriptUnavailable(format!("no English transcript for {id}"))
        })?;

        let captions = self
            .download_captions(url)
            .await
            .map_err(|e| SourceError::TranscriptUnavailable(format!("{e:#}")))?;
        Ok(segments_from_json3(captions))
    }
}

#[async_trait::async_trait]
impl VideoSource for YtDlpSource {
    async fn fetch_metadata(&self, id: &VideoId) -> Result<VideoMetadata, SourceError> {
        let info = self
            .dump_info(id)
            .await
            .map_err(|e| SourceError::VideoUnavailable(format!("{e:#}")))?;
        Ok(metadata_from_info(&info))
    }

    async fn fetch_transcript(&self, id: &VideoId) -> Result<Vec<TranscriptSegment>, SourceError> {
        let info = self
            .dump_info(id)
            .await
            .map_err(|e| SourceError::TranscriptUnavailable(format!("{e:#}")))?;
        self.transcript_from_info(id, &info).await
    }

    async fn fetch_video(
        &self,
        id: &VideoId,
    ) -> Result<(VideoMetadata, Vec<TranscriptSegment>), SourceError> {
        let info = self
            .dump_info(id)
            .await
            .map_err(|e| SourceError::VideoUnavailable(format!("{e:#}")))?;
        let transcript = self.transcript_from_info(id, &info).await?;
        Ok((metadata_from_info(&info), transcript))
    }
}

#[derive(Debug, Default, Deserialize)]
struct InfoDump {
    title: Option<String>,
    duration: Option<f64>,
    thumbnail: Option<String>,
    subtitles: Option<HashMap<String, Vec<CaptionFormat>>>,
    automatic_captions: Option<HashMap<String, Vec<CaptionFormat>>>,
}

#[derive(Debug, Deserialize)]
struct CaptionFormat {
    ext: Option<String>,
    url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Json3 {
    #[serde(default)]
    events: Vec<Json3Event>,
}

#[derive(Debug, Deserialize)]
struct Json3Event {
    #[serde(rename = "tStartMs", default)]
    start_ms: i64,
    #[serde(rename = "dDurationMs", default)]
    duration_ms: i64,
    segs: Option<Vec<Json3Seg>>,
}

#[derive(Debug, Deserialize)]
struct Json3Seg {
    #[serde(default)]
    utf8: String,
}

fn metadata_from_info(info: &InfoDump) -> VideoMetadata {
    let duration = info
        .duration
        .filter(|d| d.is_finite() && *d >= 0.0)
        .map(|d| d.round() as i64)
        .unwrap_or(0);

    VideoMetadata {
        title: info.title.clone().unwrap_or_default(),
        duration,
        thumbnail: info.thumbnail.clone().filter(|t| !t.trim().is_empty()),
    }
}

// Manual subtitles win over auto-generated ones; plain `en` wins over regional variants.
fn english_track_url(info: &InfoDump) -> Option<&str> {
    [info.subtitles.as_ref(), info.automatic_captions.as_ref()]
        .into_iter()
        .flatten()
        .find_map(english_json3_url)
}

fn english_json3_url(tracks: &HashMap<String, Vec<CaptionFormat>>) -> Option<&str> {
    let mut langs: Vec<&str> = tracks
        .keys()
        .map(String::as_str)
        .filter(|k| *k == "en" || k.starts_with("en-"))
        .collect();
    langs.sort_by_key(|k| (*k != "en", *k));

    langs.into_iter().find_map(|lang| {
        tracks[lang]
            .iter()
            .filter(|f| f.ext.as_deref() == Some("json3"))
            .filter_map(|f| f.url.as_deref())
            .find(|url| !is_translated(url))
    })
}

// yt-dlp lists machine translations of the auto track under the target language,
// marked by a `tlang` query parameter.
fn is_translated(url: &str) -> bool {
    match reqwest::Url::parse(url) {
        Ok(parsed) => parsed.query_pairs().any(|(k, _)| k == "tlang"),
        Err(_) => url.contains("tlang="),
    }
}

fn segments_from_json3(captions: Json3) -> Vec<TranscriptSegment> {
    captions
        .events
        .into_iter()
        .filter_map(|ev| {
            let text: String = ev.segs?.into_iter().map(|s| s.utf8).collect();
            let text = text.trim();
            if text.is_empty() {
                return None;
            }
            Some(TranscriptSegment {
                start: round2(ev.start_ms as f64 / 1000.0),
                duration: round2(ev.duration_ms as f64 / 1000.0),
                text: text.to_string(),
            })
        })
        .collect()
}
