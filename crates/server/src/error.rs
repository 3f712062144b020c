use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// API error type that converts to `{"detail": "ErrorKind: message"}` JSON
/// responses, matching `CoreError`'s own `"{Kind}: {message}"` convention.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("NotFound: {0}")]
    NotFound(String),

    #[error("InputError: {0}")]
    BadRequest(String),

    #[error("{0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    detail: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = axum::Json(ErrorResponse {
            detail: self.to_string(),
        });
        (status, body).into_response()
    }
}

impl From<jay_ocr_core::CoreError> for ApiError {
    fn from(err: jay_ocr_core::CoreError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<std::io::Error> for ApiError {
    fn from(err: std::io::Error) -> Self {
        ApiError::Internal(format!("IOError: {err}"))
    }
}

impl From<rusqlite::Error> for ApiError {
    fn from(err: rusqlite::Error) -> Self {
        ApiError::Internal(format!("StateError: {err}"))
    }
}

impl From<jay_ocr_storage::StorageError> for ApiError {
    fn from(err: jay_ocr_storage::StorageError) -> Self {
        ApiError::Internal(format!("StorageError: {err}"))
    }
}
