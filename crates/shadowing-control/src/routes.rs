use axum::{
    Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    middleware,
    routing::{get, post},
};
use serde::Serialize;
use serde_json::Value;

use crate::{
    error::ApiError,
    progress_service::{NewProgress, ProgressEntry, ProgressHistory},
    request_meta, security,
    state::AppState,
    video_service::{LibraryEntry, TranscriptDto, VideoDto},
};

#[derive(Debug, Serialize)]
struct MessageResponse {
    message: &'static str,
}

#[derive(Debug, Serialize)]
struct HealthzResponse {
    status: &'static str,
    version: &'static str,
    database: bool,
}

async fn healthz(State(state): State<AppState>) -> Json<HealthzResponse> {
    let database = match state.db.ping().await {
        Ok(()) => true,
        Err(err) => {
            tracing::warn!(%err, "database ping failed");
            false
        }
    };
    Json(HealthzResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        database,
    })
}

async fn create_video(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<VideoDto>, ApiError> {
    let url = match &body {
        Ok(Json(v)) => v.get("url").and_then(Value::as_str),
        Err(_) => None,
    }
    .ok_or_else(|| ApiError::validation("Missing 'url' field"))?;

    Ok(Json(state.videos.get_or_fetch(url).await?))
}

async fn get_video(
    State(state): State<AppState>,
    Path(video_id): Path<String>,
) -> Result<Json<VideoDto>, ApiError> {
    Ok(Json(state.videos.get_video(&video_id).await?))
}

async fn get_transcript(
    State(state): State<AppState>,
    Path(video_id): Path<String>,
) -> Result<Json<TranscriptDto>, ApiError> {
    Ok(Json(state.videos.get_transcript(&video_id).await?))
}

async fn list_videos(State(state): State<AppState>) -> Result<Json<Vec<LibraryEntry>>, ApiError> {
    Ok(Json(state.videos.list_videos().await?))
}

async fn delete_video(
    State(state): State<AppState>,
    Path(video_id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.videos.delete_video(&video_id).await?;
    Ok(Json(MessageResponse {
        message: "Video deleted",
    }))
}

async fn create_progress(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<ProgressEntry>), ApiError> {
    let Json(body) = body.map_err(|rejection| {
        tracing::debug!(%rejection, "unreadable progress body");
        ApiError::validation("Missing request body")
    })?;
    let input = NewProgress::from_json(&body)?;
    let entry = state.progress.create_progress(input).await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

async fn get_progress(
    State(state): State<AppState>,
    Path(video_id): Path<String>,
) -> Result<Json<ProgressHistory>, ApiError> {
    Ok(Json(state.progress.get_progress_history(&video_id).await?))
}

async fn not_found() -> ApiError {
    ApiError::NotFound("Not found".to_string())
}

async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed("Method not allowed".to_string())
}

/// The video and progress API, unprefixed.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/video", post(create_video))
        .route("/video/:video_id", get(get_video).delete(delete_video))
        .route("/video/:video_id/transcript", get(get_transcript))
        .route("/videos", get(list_videos))
        .route("/progress", post(create_progress))
        .route("/progress/:video_id", get(get_progress))
        .method_not_allowed_fallback(method_not_allowed)
        .fallback(not_found)
}

/// Full application: `/healthz`, the API under `api_prefix`, JSON fallbacks, CORS
/// and request ids.
pub fn app(state: AppState, api_prefix: &str) -> Router {
    let base = Router::new().route("/healthz", get(healthz));
    let base = if api_prefix.is_empty() {
        base.merge(router())
    } else {
        base.nest(api_prefix, router())
    };

    base.method_not_allowed_fallback(method_not_allowed)
        .fallback(not_found)
        .layer(middleware::from_fn_with_state(state.clone(), security::cors))
        .layer(middleware::from_fn(request_meta::request_id))
        .with_state(state)
}
