use std::sync::Arc;

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, QueryOrder, Set,
};
use serde::Serialize;
use serde_json::Value;
use shadowing_db::entities::{progress, videos};

use crate::error::ApiError;

pub const MAX_STEP: i32 = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressEntry {
    pub id: i32,
    pub video_id: String,
    pub round: i32,
    pub step: i32,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<progress::Model> for ProgressEntry {
    fn from(p: progress::Model) -> Self {
        Self {
            id: p.id,
            video_id: p.video_id,
            round: p.round,
            step: p.step,
            notes: p.notes,
            created_at: p.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressHistory {
    pub video_id: String,
    pub current_round: i32,
    pub current_step: i32,
    pub entries: Vec<ProgressEntry>,
}

/// A practice event as submitted by a client, already shape-checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProgress {
    pub video_id: String,
    pub round: i32,
    pub step: i32,
    pub notes: Option<String>,
}

impl NewProgress {
    /// Field-by-field validation of a raw JSON body.
    ///
    /// Presence is checked for all three required fields before any of them is
    /// range-checked, so a body missing `step` reports `step` even if `round` is 0.
    pub fn from_json(body: &Value) -> Result<Self, ApiError> {
        let body = body
            .as_object()
            .ok_or_else(|| ApiError::validation("Missing request body"))?;
        let present = |key: &str| body.get(key).filter(|v| !v.is_null());

        let video_id = match present("video_id") {
            None => return Err(ApiError::validation("Missing 'video_id' field")),
            Some(Value::String(s)) if s.is_empty() => {
                return Err(ApiError::validation("Missing 'video_id' field"));
            }
            Some(Value::String(s)) => s.clone(),
            Some(_) => return Err(ApiError::validation("'video_id' must be a string")),
        };
        let round = present("round").ok_or_else(|| ApiError::validation("Missing 'round' field"))?;
        let step = present("step").ok_or_else(|| ApiError::validation("Missing 'step' field"))?;

        let round = as_i32(round).ok_or_else(round_error)?;
        let step = as_i32(step).ok_or_else(step_error)?;

        let notes = match present("notes") {
            None => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(_) => return Err(ApiError::validation("'notes' must be a string")),
        };

        let input = Self {
            video_id,
            round,
            step,
            notes,
        };
        input.validate()?;
        Ok(input)
    }

    pub fn validate(&self) -> Result<(), ApiError> {
        if self.video_id.is_empty() {
            return Err(ApiError::validation("Missing 'video_id' field"));
        }
        if self.round < 1 {
            return Err(round_error());
        }
        if !(1..=MAX_STEP).contains(&self.step) {
            return Err(step_error());
        }
        Ok(())
    }
}

// JSON booleans and floats are not integers, even when they look like one.
fn as_i32(v: &Value) -> Option<i32> {
    v.as_i64().and_then(|n| i32::try_from(n).ok())
}

fn round_error() -> ApiError {
    ApiError::validation("'round' must be an integer >= 1")
}

fn step_error() -> ApiError {
    ApiError::validation(format!("'step' must be an integer between 1 and {MAX_STEP}"))
}

/// The "current" entry of a video: latest by `created_at`, ties broken by insertion id.
pub(crate) async fn latest_entry<C: ConnectionTrait>(
    db: &C,
    video_id: &str,
) -> Result<Option<progress::Model>, DbErr> {
    progress::Entity::find()
        .filter(progress::Column::VideoId.eq(video_id))
        .order_by_desc(progress::Column::CreatedAt)
        .order_by_desc(progress::Column::Id)
        .one(db)
        .await
}

/// Append-only practice log per video.
#[derive(Clone)]
pub struct ProgressService {
    db: Arc<DatabaseConnection>,
}

impl ProgressService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    pub async fn create_progress(&self, input: NewProgress) -> Result<ProgressEntry, ApiError> {
        input.validate()?;
        let db = &*self.db;

        if videos::Entity::find_by_id(input.video_id.as_str())
            .one(db)
            .await?
            .is_none()
        {
            return Err(ApiError::video_not_found());
        }

        let saved = progress::ActiveModel {
            video_id: Set(input.video_id),
            round: Set(input.round),
            step: Set(input.step),
            notes: Set(input.notes),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(db)
        .await?;

        tracing::info!(
            video_id = %saved.video_id,
            id = saved.id,
            round = saved.round,
            step = saved.step,
            "progress recorded"
        );
        Ok(saved.into())
    }

    pub async fn get_progress_history(&self, video_id: &str) -> Result<ProgressHistory, ApiError> {
        let db = &*self.db;
        if videos::Entity::find_by_id(video_id).one(db).await?.is_none() {
            return Err(ApiError::video_not_found());
        }

        let mut rows = progress::Entity::find()
            .filter(progress::Column::VideoId.eq(video_id))
            .order_by_asc(progress::Column::Id)
            .all(db)
            .await?;
        rows.sort_by_key(|p| (p.created_at, p.id));

        let (current_round, current_step) = rows
            .last()
            .map(|p| (p.round, p.step))
            .unwrap_or((0, 0));

        Ok(ProgressHistory {
            video_id: video_id.to_string(),
            current_round,
            current_step,
            entries: rows.into_iter().map(ProgressEntry::from).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use sea_orm::PaginatorTrait;
    use serde_json::json;

    use super::*;
    use crate::test_support::{memory_db, seed_video};

    const VIDEO: &str = "dQw4w9WgXcQ";

    async fn service() -> (ProgressService, Arc<DatabaseConnection>) {
        let db = Arc::new(memory_db().await);
        seed_video(&db, VIDEO).await;
        (ProgressService::new(db.clone()), db)
    }

    fn message(err: ApiError) -> String {
        assert!(matches!(err, ApiError::Validation(_)), "{err:?}");
        err.to_string()
    }

    fn new(round: i32, step: i32, notes: Option<&str>) -> NewProgress {
        NewProgress {
            video_id: VIDEO.to_string(),
            round,
            step,
            notes: notes.map(str::to_string),
        }
    }

    #[test]
    fn parses_complete_body() {
        let p = NewProgress::from_json(&json!({
            "video_id": VIDEO, "round": 2, "step": 5, "notes": "Good progress"
        }))
        .unwrap();
        assert_eq!(p, new(2, 5, Some("Good progress")));
    }

    #[test]
    fn notes_default_to_none() {
        let p = NewProgress::from_json(&json!({ "video_id": VIDEO, "round": 1, "step": 1 })).unwrap();
        assert_eq!(p.notes, None);
        let p = NewProgress::from_json(&json!({
            "video_id": VIDEO, "round": 1, "step": 1, "notes": null
        }))
        .unwrap();
        assert_eq!(p.notes, None);
    }

    #[test]
    fn missing_fields_are_named() {
        let m = message(NewProgress::from_json(&json!({ "round": 1, "step": 3 })).unwrap_err());
        assert!(m.contains("video_id"), "{m}");
        let m = message(NewProgress::from_json(&json!({ "video_id": "", "round": 1, "step": 3 })).unwrap_err());
        assert!(m.contains("video_id"), "{m}");
        let m = message(NewProgress::from_json(&json!({ "video_id": VIDEO, "step": 3 })).unwrap_err());
        assert!(m.contains("round"), "{m}");
        let m = message(NewProgress::from_json(&json!({ "video_id": VIDEO, "round": 1 })).unwrap_err());
        assert!(m.contains("step"), "{m}");
    }

    #[test]
    fn non_object_body_is_rejected() {
        let m = message(NewProgress::from_json(&json!([1, 2, 3])).unwrap_err());
        assert_eq!(m, "Missing request body");
    }

    #[test]
    fn round_must_be_positive_integer() {
        for bad in [json!(0), json!(-1), json!(1.5), json!("1"), json!(true), json!(1u64 << 40)] {
            let m = message(
                NewProgress::from_json(&json!({ "video_id": VIDEO, "round": bad, "step": 1 }))
                    .unwrap_err(),
            );
            assert!(m.contains("round"), "{m}");
        }
    }

    #[test]
    fn step_must_be_between_one_and_five() {
        for bad in [json!(0), json!(6), json!(-3), json!(2.0), json!("3")] {
            let m = message(
                NewProgress::from_json(&json!({ "video_id": VIDEO, "round": 1, "step": bad }))
                    .unwrap_err(),
            );
            assert!(m.contains("step"), "{m}");
        }
        for ok in 1..=5 {
            assert!(NewProgress::from_json(&json!({ "video_id": VIDEO, "round": 1, "step": ok })).is_ok());
        }
    }

    #[test]
    fn non_string_notes_are_rejected() {
        let m = message(
            NewProgress::from_json(&json!({ "video_id": VIDEO, "round": 1, "step": 1, "notes": 7 }))
                .unwrap_err(),
        );
        assert!(m.contains("notes"), "{m}");
    }

    #[tokio::test]
    async fn create_assigns_id_and_timestamp() {
        let (svc, _db) = service().await;
        let before = Utc::now();
        let entry = svc.create_progress(new(1, 3, Some("Good progress"))).await.unwrap();

        assert!(entry.id > 0);
        assert_eq!(entry.video_id, VIDEO);
        assert_eq!(entry.round, 1);
        assert_eq!(entry.step, 3);
        assert_eq!(entry.notes.as_deref(), Some("Good progress"));
        assert!(entry.created_at >= before);
    }

    #[tokio::test]
    async fn create_for_unknown_video_writes_nothing() {
        let (svc, db) = service().await;
        let mut input = new(1, 3, None);
        input.video_id = "nonexistent".to_string();

        let err = svc.create_progress(input).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
        assert_eq!(progress::Entity::find().count(&*db).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn create_revalidates_typed_input() {
        let (svc, db) = service().await;
        let err = svc.create_progress(new(0, 1, None)).await.unwrap_err();
        assert!(err.to_string().contains("round"));
        let err = svc.create_progress(new(1, 6, None)).await.unwrap_err();
        assert!(err.to_string().contains("step"));
        assert_eq!(progress::Entity::find().count(&*db).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn history_of_unknown_video_is_not_found() {
        let (svc, _db) = service().await;
        assert!(matches!(
            svc.get_progress_history("nonexistent").await.unwrap_err(),
            ApiError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn empty_history_reports_zeroes() {
        let (svc, _db) = service().await;
        let h = svc.get_progress_history(VIDEO).await.unwrap();
        assert_eq!(h.video_id, VIDEO);
        assert_eq!((h.current_round, h.current_step), (0, 0));
        assert!(h.entries.is_empty());
    }

    #[tokio::test]
    async fn current_is_the_latest_entry() {
        let (svc, _db) = service().await;
        svc.create_progress(new(1, 5, None)).await.unwrap();
        svc.create_progress(new(2, 3, Some("Second round"))).await.unwrap();
        // Going back a round still moves "current".
        svc.create_progress(new(1, 2, None)).await.unwrap();

        let h = svc.get_progress_history(VIDEO).await.unwrap();
        assert_eq!((h.current_round, h.current_step), (1, 2));
        let rounds: Vec<i32> = h.entries.iter().map(|e| e.round).collect();
        assert_eq!(rounds, vec![1, 2, 1]);
        assert_eq!(h.entries[1].notes.as_deref(), Some("Second round"));
        assert!(h.entries.windows(2).all(|w| w[0].created_at <= w[1].created_at));
    }

    #[tokio::test]
    async fn latest_entry_breaks_timestamp_ties_by_id() {
        let (_svc, db) = service().await;
        assert!(latest_entry(&*db, VIDEO).await.unwrap().is_none());

        let at = Utc::now();
        for round in [4, 7] {
            progress::ActiveModel {
                video_id: Set(VIDEO.to_string()),
                round: Set(round),
                step: Set(1),
                notes: Set(None),
                created_at: Set(at),
                ..Default::default()
            }
            .insert(&*db)
            .await
            .unwrap();
        }

        let latest = latest_entry(&*db, VIDEO).await.unwrap().unwrap();
        assert_eq!(latest.round, 7);
        assert!(latest_entry(&*db, "nonexistent").await.unwrap().is_none());
    }
}
