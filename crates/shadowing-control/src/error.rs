use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::youtube::SourceError;

/// Every failure a request can end in. The display string is what the client sees,
/// except for `Internal`, whose detail only reaches the log.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    InvalidUrl(String),
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    MethodNotAllowed(String),
    #[error("{0}")]
    TranscriptUnavailable(String),
    #[error("{0}")]
    VideoUnavailable(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub error_code: &'static str,
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn video_not_found() -> Self {
        Self::NotFound("Video not found".to_string())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidUrl(_) | Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            Self::TranscriptUnavailable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::VideoUnavailable(_) => StatusCode::BAD_GATEWAY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidUrl(_) => "INVALID_URL",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::NotFound(_) => "NOT_FOUND",
            Self::MethodNotAllowed(_) => "METHOD_NOT_ALLOWED",
            Self::TranscriptUnavailable(_) => "TRANSCRIPT_UNAVAILABLE",
            Self::VideoUnavailable(_) => "VIDEO_UNAVAILABLE",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<sea_orm::DbErr> for ApiError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Internal(anyhow::Error::new(err).context("database error"))
    }
}

impl From<SourceError> for ApiError {
    fn from(err: SourceError) -> Self {
        match err {
            SourceError::VideoUnavailable(reason) => {
                Self::VideoUnavailable(format!("Failed to fetch video data: {reason}"))
            }
            SourceError::TranscriptUnavailable(reason) => {
                Self::TranscriptUnavailable(format!("Failed to fetch transcript: {reason}"))
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error_code = self.code();
        let error = match self {
            Self::Internal(err) => {
                tracing::error!(error = %format!("{err:#}"), "request failed");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };
        (status, Json(ErrorBody { error, error_code })).into_response()
    }
}
