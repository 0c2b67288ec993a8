//! HTTP handlers for album operations.

use crate::{errors::AppError, handlers::require_identity, models::album::Album, state::AppState};
use axum::{
    Json,
    extract::{Path, State},
    http::HeaderMap,
};
use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct CreateAlbumReq {
    pub name: String,
    pub description: Option<String>,
}

/// POST `/api/albums` — create an album for the caller.
pub async fn create_album(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CreateAlbumReq>,
) -> Result<Json<Album>, AppError> {
    let identity = require_identity(&headers)?;
    let name = req.name.trim();
    if name.is_empty() {
        return Err(AppError::bad_request("album name cannot be empty"));
    }

    let album = state
        .records
        .create_album(&identity, name, req.description)
        .await?;
    Ok(Json(album))
}

/// GET `/api/albums` — list the caller's albums.
pub async fn list_albums(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<Album>>, AppError> {
    let identity = require_identity(&headers)?;
    let albums = state.records.list_albums(&identity).await?;
    Ok(Json(albums))
}

/// GET `/api/albums/{id}` — fetch one album; its photos come from
/// `GET /api/photos?album_id=...`.
pub async fn get_album(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<Album>, AppError> {
    let identity = require_identity(&headers)?;
    let album = state.records.get_album(&identity, id).await?;
    Ok(Json(album))
}
