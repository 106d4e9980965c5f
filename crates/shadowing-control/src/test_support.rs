use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use chrono::Utc;
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};
use shadowing_db::entities::{progress, videos};
use shadowing_types::{TranscriptSegment, VideoId, VideoMetadata};

use crate::{
    state::{AppState, init_db_and_migrate},
    youtube::{SourceError, VideoSource},
};

pub fn sample_metadata() -> VideoMetadata {
    VideoMetadata {
        title: "Test Video".to_string(),
        duration: 120,
        thumbnail: Some("https://img.youtube.com/test.jpg".to_string()),
    }
}

pub fn sample_transcript() -> Vec<TranscriptSegment> {
    vec![TranscriptSegment {
        start: 0.0,
        duration: 2.5,
        text: "Hello world".to_string(),
    }]
}

/// Canned upstream that counts how often each capability is hit.
pub struct MockSource {
    metadata: Result<VideoMetadata, SourceError>,
    transcript: Result<Vec<TranscriptSegment>, SourceError>,
    pub metadata_calls: AtomicUsize,
    pub transcript_calls: AtomicUsize,
}

impl MockSource {
    fn with(
        metadata: Result<VideoMetadata, SourceError>,
        transcript: Result<Vec<TranscriptSegment>, SourceError>,
    ) -> Self {
        Self {
            metadata,
            transcript,
            metadata_calls: AtomicUsize::new(0),
            transcript_calls: AtomicUsize::new(0),
        }
    }

    pub fn ok() -> Self {
        Self::with(Ok(sample_metadata()), Ok(sample_transcript()))
    }

    pub fn failing_metadata() -> Self {
        Self::with(
            Err(SourceError::VideoUnavailable("Private video".to_string())),
            Ok(sample_transcript()),
        )
    }

    pub fn failing_transcript() -> Self {
        Self::with(
            Ok(sample_metadata()),
            Err(SourceError::TranscriptUnavailable(
                "Transcripts are disabled for this video".to_string(),
            )),
        )
    }
}

#[async_trait::async_trait]
impl VideoSource for MockSource {
    async fn fetch_metadata(&self, _id: &VideoId) -> Result<VideoMetadata, SourceError> {
        self.metadata_calls.fetch_add(1, Ordering::SeqCst);
        self.metadata.clone()
    }

    async fn fetch_transcript(&self, _id: &VideoId) -> Result<Vec<TranscriptSegment>, SourceError> {
        self.transcript_calls.fetch_add(1, Ordering::SeqCst);
        self.transcript.clone()
    }
}

pub async fn memory_db() -> DatabaseConnection {
    init_db_and_migrate("sqlite::memory:")
        .await
        .expect("in-memory database")
}

pub async fn memory_state(source: Arc<MockSource>) -> AppState {
    AppState::new(
        memory_db().await,
        source,
        vec!["http://localhost:5173".to_string()],
    )
}

pub async fn seed_video(db: &DatabaseConnection, video_id: &str) -> videos::Model {
    videos::ActiveModel {
        video_id: Set(video_id.to_string()),
        title: Set("Test Video".to_string()),
        duration: Set(120),
        thumbnail: Set(Some("https://img.youtube.com/test.jpg".to_string())),
        transcript: Set(videos::Transcript(sample_transcript())),
        created_at: Set(Utc::now()),
    }
    .insert(db)
    .await
    .expect("seed video")
}

pub async fn seed_progress(
    db: &DatabaseConnection,
    video_id: &str,
    round: i32,
    step: i32,
) -> progress::Model {
    progress::ActiveModel {
        video_id: Set(video_id.to_string()),
        round: Set(round),
        step: Set(step),
        notes: Set(None),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("seed progress")
}
