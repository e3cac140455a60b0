//! Crate-wide error type and its mapping onto the HTTP envelope.

use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;

use crate::connection_manager::ConnectionError;
use crate::job_engine::JobEngineError;
use crate::repository::RepositoryError;
use crate::sync_engine::SyncEngineError;

/// Error kinds surfaced to API consumers as a stable `code`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InvalidRequest,
    NotFound,
    Conflict,
    DatabaseError,
    ConnectionError,
    SyncError,
    InternalError,
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error(transparent)]
    Sync(#[from] SyncEngineError),

    #[error(transparent)]
    JobEngine(#[from] JobEngineError),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Validation(_) => ErrorCode::InvalidRequest,
            AppError::Repository(RepositoryError::NotFound) => ErrorCode::NotFound,
            AppError::Repository(RepositoryError::Conflict(_)) => ErrorCode::Conflict,
            AppError::Repository(RepositoryError::Database(_)) => ErrorCode::DatabaseError,
            AppError::Connection(_) => ErrorCode::ConnectionError,
            AppError::Sync(_) => ErrorCode::SyncError,
            AppError::JobEngine(JobEngineError::NotFound(_)) => ErrorCode::NotFound,
            AppError::JobEngine(_) => ErrorCode::InvalidRequest,
            AppError::Internal(_) => ErrorCode::InternalError,
        }
    }

    fn status(&self) -> StatusCode {
        match self.code() {
            ErrorCode::InvalidRequest => StatusCode::BAD_REQUEST,
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::Conflict => StatusCode::CONFLICT,
            ErrorCode::DatabaseError | ErrorCode::ConnectionError | ErrorCode::SyncError => {
                StatusCode::BAD_GATEWAY
            }
            ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Serialize)]
struct ErrorEnvelope {
    success: bool,
    error: String,
    code: ErrorCode,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status();
        tracing::error!(error = %self, code = ?self.code(), "request failed");
        let body = ErrorEnvelope {
            success: false,
            error: self.to_string(),
            code: self.code(),
        };
        (status, Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_maps_to_invalid_request() {
        let err = AppError::Validation("no enabled table mappings".into());
        assert_eq!(err.code(), ErrorCode::InvalidRequest);
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn not_found_maps_to_404() {
        let err = AppError::Repository(RepositoryError::NotFound);
        assert_eq!(err.code(), ErrorCode::NotFound);
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn conflict_maps_to_409() {
        let err = AppError::Repository(RepositoryError::Conflict("duplicate name".into()));
        assert_eq!(err.code(), ErrorCode::Conflict);
        assert_eq!(err.status(), StatusCode::CONFLICT);
    }
}
