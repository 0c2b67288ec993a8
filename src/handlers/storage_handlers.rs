//! HTTP handlers for direct blob-store access.
//! Streams object bodies to avoid buffering in memory and delegates storage
//! concerns to `StorageService`.

use crate::{
    errors::AppError,
    handlers::require_identity,
    models::key::{MediaCategory, MediaKey},
    state::AppState,
};
use axum::{
    body::Body,
    extract::{Path, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use futures::StreamExt;
use std::io;
use tokio_util::io::ReaderStream;

/// PUT `/storage/{*key}` — direct client write of an original object.
///
/// Only `photos/` and `videos/` keys are writable here, and the key's
/// identity segment must match the caller. Derived objects under
/// `thumbnails/` are written exclusively by the pipeline.
pub async fn upload_object(
    State(state): State<AppState>,
    Path(key): Path<String>,
    headers: HeaderMap,
    body: Body,
) -> Result<impl IntoResponse, AppError> {
    let identity = require_identity(&headers)?;

    let media = MediaKey::parse(&key)
        .ok_or_else(|| AppError::bad_request("key must be photos/{identity}/... or videos/{identity}/..."))?;
    match media.category {
        MediaCategory::Photo | MediaCategory::Video => {}
        MediaCategory::Thumbnail => {
            return Err(AppError::new(
                StatusCode::FORBIDDEN,
                "thumbnails are generated, not uploaded",
            ));
        }
    }
    if media.identity != identity {
        return Err(AppError::new(
            StatusCode::FORBIDDEN,
            "key identity does not match caller",
        ));
    }

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string());

    let stream = body
        .into_data_stream()
        .map(|chunk| chunk.map_err(io::Error::other));

    let object = state
        .storage
        .put_object_stream(&key, content_type, stream)
        .await?;

    let mut resp_headers = HeaderMap::new();
    if let Some(etag) = object.etag.as_deref() {
        if let Ok(value) = HeaderValue::from_str(&format!("\"{etag}\"")) {
            resp_headers.insert(header::ETAG, value);
        }
    }

    let mut response = Response::new(Body::empty());
    *response.status_mut() = StatusCode::OK;
    *response.headers_mut() = resp_headers;
    Ok(response)
}

/// GET `/storage/{*key}` — download an object as a streaming response.
///
/// This is what the URLs handed out by the read path resolve to; a missing
/// thumbnail key returns 404 and the client falls back to the original.
pub async fn get_object(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Response, AppError> {
    let (meta, file) = state.storage.get_object_reader(&key).await?;
    let stream = ReaderStream::new(file);
    let body = Body::from_stream(stream);

    let mut response = Response::new(body);
    *response.status_mut() = StatusCode::OK;
    let headers = response.headers_mut();
    let content_type = meta
        .content_type
        .unwrap_or_else(|| "application/octet-stream".into());
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(&content_type)
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );
    headers.insert(
        header::CONTENT_LENGTH,
        HeaderValue::from_str(&meta.size_bytes.max(0).to_string())
            .unwrap_or_else(|_| HeaderValue::from_static("0")),
    );
    headers.insert(
        header::LAST_MODIFIED,
        HeaderValue::from_str(&meta.last_modified.to_rfc2822())
            .unwrap_or_else(|_| HeaderValue::from_static("")),
    );

    Ok(response)
}
