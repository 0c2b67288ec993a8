use crate::services::{record_service::RecordError, storage_service::StorageError};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

/// A lightweight wrapper for general errors that keeps the message local.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    /// Create a new AppError with a specific status and message.
    pub fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            message: msg.into(),
        }
    }

    /// Shortcut for a 500 Internal Server Error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, msg)
    }

    /// Shortcut for 404 Not Found
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, msg)
    }

    /// Shortcut for 400 Bad Request
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, msg)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.message,
            "status": self.status.as_u16()
        }));

        (self.status, body).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::internal(err.to_string())
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match &err {
            StorageError::ObjectNotFound(_) => AppError::not_found(err.to_string()),
            StorageError::InvalidObjectKey => AppError::bad_request(err.to_string()),
            StorageError::Io(_) => AppError::internal(err.to_string()),
        }
    }
}

impl From<RecordError> for AppError {
    fn from(err: RecordError) -> Self {
        match &err {
            RecordError::PhotoNotFound(_)
            | RecordError::AlbumNotFound(_)
            | RecordError::ShareLinkNotFound(_) => AppError::not_found(err.to_string()),
            RecordError::ShareLinkExpired(_) => AppError::new(StatusCode::GONE, err.to_string()),
            RecordError::InvalidCursor => AppError::bad_request(err.to_string()),
            RecordError::Sqlx(_) => AppError::internal(err.to_string()),
        }
    }
}
