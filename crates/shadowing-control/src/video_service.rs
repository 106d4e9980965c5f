use std::sync::Arc;

use chrono::{DateTime, Utc};
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set, TransactionTrait,
    sea_query::OnConflict,
};
use serde::Serialize;
use shadowing_db::entities::{progress, videos};
use shadowing_types::{TranscriptSegment, extract_video_id};

use crate::{error::ApiError, progress_service::latest_entry, youtube::VideoSource};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VideoDto {
    pub video_id: String,
    pub title: String,
    pub duration: i64,
    pub thumbnail: Option<String>,
    pub transcript: Vec<TranscriptSegment>,
}

impl From<videos::Model> for VideoDto {
    fn from(v: videos::Model) -> Self {
        Self {
            video_id: v.video_id,
            title: v.title,
            duration: v.duration,
            thumbnail: v.thumbnail,
            transcript: v.transcript.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TranscriptDto {
    pub video_id: String,
    pub transcript: Vec<TranscriptSegment>,
}

/// A library row: the video without its transcript, plus practice recency.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LibraryEntry {
    pub video_id: String,
    pub title: String,
    pub duration: i64,
    pub thumbnail: Option<String>,
    pub last_practiced: Option<DateTime<Utc>>,
    pub current_round: i32,
}

/// Cache-or-fetch over the `videos` table. A stored video is never refreshed.
#[derive(Clone)]
pub struct VideoService {
    db: Arc<DatabaseConnection>,
    source: Arc<dyn VideoSource>,
}

impl VideoService {
    pub fn new(db: Arc<DatabaseConnection>, source: Arc<dyn VideoSource>) -> Self {
        Self { db, source }
    }

    pub async fn get_or_fetch(&self, url: &str) -> Result<VideoDto, ApiError> {
        let db = &*self.db;
        let id = extract_video_id(url)
            .ok_or_else(|| ApiError::InvalidUrl("Invalid YouTube URL".to_string()))?;

        if let Some(existing) = videos::Entity::find_by_id(id.as_str()).one(db).await? {
            tracing::debug!(video_id = %id, "video cache hit");
            return Ok(existing.into());
        }

        let (metadata, transcript) = self.source.fetch_video(&id).await.inspect_err(|err| {
            tracing::warn!(video_id = %id, %err, "upstream fetch failed");
        })?;

        let segments = transcript.len();
        let model = videos::ActiveModel {
            video_id: Set(id.as_str().to_string()),
            title: Set(metadata.title),
            duration: Set(metadata.duration.max(0)),
            thumbnail: Set(metadata.thumbnail),
            transcript: Set(videos::Transcript(transcript)),
            created_at: Set(Utc::now()),
        };

        // A concurrent request may have stored the same id first; keep whichever row won.
        let inserted = videos::Entity::insert(model)
            .on_conflict(
                OnConflict::column(videos::Column::VideoId)
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(db)
            .await?;

        let stored = videos::Entity::find_by_id(id.as_str())
            .one(db)
            .await?
            .ok_or_else(|| anyhow::anyhow!("video {id} missing right after insert"))?;

        if inserted > 0 {
            tracing::info!(video_id = %id, segments, "video cached");
        }
        Ok(stored.into())
    }

    pub async fn get_transcript(&self, video_id: &str) -> Result<TranscriptDto, ApiError> {
        let video = self.find(video_id).await?;
        Ok(TranscriptDto {
            video_id: video.video_id,
            transcript: video.transcript.0,
        })
    }

    pub async fn get_video(&self, video_id: &str) -> Result<VideoDto, ApiError> {
        Ok(self.find(video_id).await?.into())
    }

    /// Most recently practiced first; never-practiced videos last.
    pub async fn list_videos(&self) -> Result<Vec<LibraryEntry>, ApiError> {
        let db = &*self.db;
        let rows = videos::Entity::find().all(db).await?;

        let mut library = Vec::with_capacity(rows.len());
        for v in rows {
            let latest = latest_entry(db, &v.video_id).await?;
            library.push(LibraryEntry {
                last_practiced: latest.as_ref().map(|p| p.created_at),
                current_round: latest.map(|p| p.round).unwrap_or(0),
                video_id: v.video_id,
                title: v.title,
                duration: v.duration,
                thumbnail: v.thumbnail,
            });
        }

        // `None` orders below every timestamp, so a descending sort leaves it at the end.
        library.sort_by(|a, b| b.last_practiced.cmp(&a.last_practiced));
        Ok(library)
    }

    pub async fn delete_video(&self, video_id: &str) -> Result<(), ApiError> {
        let txn = self.db.begin().await?;

        if videos::Entity::find_by_id(video_id).one(&txn).await?.is_none() {
            return Err(ApiError::video_not_found());
        }

        let removed = progress::Entity::delete_many()
            .filter(progress::Column::VideoId.eq(video_id))
            .exec(&txn)
            .await?
            .rows_affected;
        videos::Entity::delete_by_id(video_id).exec(&txn).await?;
        txn.commit().await?;

        tracing::info!(video_id, progress_entries = removed, "video deleted");
        Ok(())
    }

    async fn find(&self, video_id: &str) -> Result<videos::Model, ApiError> {
        videos::Entity::find_by_id(video_id)
            .one(&*self.db)
            .await?
            .ok_or_else(ApiError::video_not_found)
    }
}
