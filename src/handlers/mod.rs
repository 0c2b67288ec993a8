//! HTTP handlers, grouped by concern.

pub mod album_handlers;
pub mod health_handlers;
pub mod photo_handlers;
pub mod share_handlers;
pub mod storage_handlers;

use crate::errors::AppError;
use axum::http::{HeaderMap, StatusCode};

/// Header carrying the caller identity issued by the identity provider.
pub const IDENTITY_HEADER: &str = "x-identity-id";

/// Extract and validate the caller identity from request headers.
///
/// The identity becomes a storage-key segment and a record owner id, so it
/// must be present, non-empty, and free of path separators.
pub fn require_identity(headers: &HeaderMap) -> Result<String, AppError> {
    let identity = headers
        .get(IDENTITY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            AppError::new(
                StatusCode::UNAUTHORIZED,
                format!("missing {IDENTITY_HEADER} header"),
            )
        })?;

    if identity.contains('/') || identity.contains("..") {
        return Err(AppError::bad_request("invalid identity"));
    }
    Ok(identity.to_string())
}
