//! HTTP handlers for album share links.
//!
//! Sharing mints a capability URL for an album; `GET /share/{id}` is the
//! only read path that skips the identity header. The link id is
//! unguessable, the album owner controls expiry, and resolving counts the
//! view.

use crate::{
    errors::AppError,
    handlers::photo_handlers::{PhotoView, resolve_urls},
    handlers::require_identity,
    models::{album::Album, share_link::ShareLink},
    services::record_service::ListPhotosParams,
    state::AppState,
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::HeaderMap,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Default, Deserialize)]
pub struct CreateShareLinkReq {
    /// When the link should stop resolving; omit for a link that never
    /// expires.
    pub expires_at: Option<DateTime<Utc>>,
}

/// A share link with the path a client turns into the shareable URL.
#[derive(Debug, Serialize)]
pub struct ShareLinkView {
    #[serde(flatten)]
    pub link: ShareLink,
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct SharedGalleryQuery {
    pub cursor: Option<String>,
    pub limit: Option<usize>,
}

/// The public gallery behind a share link.
#[derive(Debug, Serialize)]
pub struct SharedGalleryResponse {
    pub share: ShareLink,
    pub album: Album,
    pub photos: Vec<PhotoView>,
    pub next_cursor: Option<String>,
}

/// POST `/api/albums/{id}/share` — mint a share link for the caller's album.
pub async fn create_share_link(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(album_id): Path<Uuid>,
    req: Option<Json<CreateShareLinkReq>>,
) -> Result<Json<ShareLinkView>, AppError> {
    let identity = require_identity(&headers)?;
    let Json(req) = req.unwrap_or_default();

    if req.expires_at.is_some_and(|at| at <= Utc::now()) {
        return Err(AppError::bad_request("expiry must be in the future"));
    }

    let link = state
        .records
        .create_share_link(&identity, album_id, req.expires_at)
        .await?;
    let url = format!("/share/{}", link.id);
    Ok(Json(ShareLinkView { link, url }))
}

/// GET `/share/{id}` — resolve a share link into the album and its photos.
///
/// No identity header: anyone holding the link can view. Photo URLs resolve
/// the same way as on the owner's gallery, thumbnail falling back to the
/// original.
pub async fn view_shared_album(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(q): Query<SharedGalleryQuery>,
) -> Result<Json<SharedGalleryResponse>, AppError> {
    let (share, album) = state.records.resolve_share_link(id).await?;

    // Photos are read with the album owner's scope; the link is the grant.
    let page = state
        .records
        .list_photos(
            &album.owner_id,
            ListPhotosParams {
                album_id: Some(album.id),
                cursor: q.cursor,
                limit: q.limit.unwrap_or(100),
            },
        )
        .await?;

    let mut photos = Vec::with_capacity(page.photos.len());
    for photo in page.photos {
        photos.push(resolve_urls(&state, photo).await?);
    }

    Ok(Json(SharedGalleryResponse {
        share,
        album,
        photos,
        next_cursor: page.next_cursor,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::IDENTITY_HEADER;
    use crate::models::photo::MediaType;
    use crate::services::record_service::{NewPhoto, RecordService};
    use crate::services::storage_service::StorageService;
    use axum::http::StatusCode;
    use sqlx::sqlite::SqlitePoolOptions;
    use std::sync::Arc;

    async fn state(storage_dir: &std::path::Path) -> AppState {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        for stmt in include_str!("../../migrations/0001_init.sql")
            .split(';')
            .map(str::trim)
            .filter(|s| !s.is_empty())
        {
            sqlx::query(stmt).execute(&pool).await.unwrap();
        }
        AppState {
            storage: StorageService::new(storage_dir, "vault-test"),
            records: RecordService::new(Arc::new(pool)),
        }
    }

    fn identity_headers(identity: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(IDENTITY_HEADER, identity.parse().unwrap());
        headers
    }

    async fn seed_album_with_photo(state: &AppState, owner: &str) -> Album {
        let album = state.records.create_album(owner, "Trip", None).await.unwrap();
        let key = format!("photos/{owner}/a.jpg");
        state
            .storage
            .put_object(&key, bytes::Bytes::from_static(b"jpeg bytes"), "image/jpeg")
            .await
            .unwrap();
        state
            .records
            .create_photo(NewPhoto {
                owner_id: owner.to_string(),
                album_id: Some(album.id),
                s3_key: key.clone(),
                thumbnail_key: key.replacen("photos/", "thumbnails/", 1),
                original_filename: "a.jpg".into(),
                caption: None,
                tags: Vec::new(),
                source: Some("web".into()),
                media_type: MediaType::Image,
                width: None,
                height: None,
                file_size: 10,
                duration: None,
            })
            .await
            .unwrap();
        album
    }

    #[tokio::test]
    async fn shared_gallery_is_readable_without_an_identity() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(dir.path()).await;
        let album = seed_album_with_photo(&state, "u1").await;

        let Json(minted) = create_share_link(
            State(state.clone()),
            identity_headers("u1"),
            Path(album.id),
            None,
        )
        .await
        .unwrap();
        assert_eq!(minted.url, format!("/share/{}", minted.link.id));

        // The viewer sends no identity header at all.
        let Json(gallery) = view_shared_album(
            State(state),
            Path(minted.link.id),
            Query(SharedGalleryQuery {
                cursor: None,
                limit: None,
            }),
        )
        .await
        .unwrap();

        assert_eq!(gallery.album.id, album.id);
        assert_eq!(gallery.share.view_count, 1);
        assert_eq!(gallery.photos.len(), 1);
        assert_eq!(
            gallery.photos[0].url.as_deref(),
            Some("/storage/photos/u1/a.jpg")
        );
        // Thumbnail not generated yet; the view falls back to the original.
        assert_eq!(
            gallery.photos[0].thumbnail_url.as_deref(),
            Some("/storage/photos/u1/a.jpg")
        );
    }

    #[tokio::test]
    async fn minting_a_share_link_requires_an_identity() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(dir.path()).await;
        let album = seed_album_with_photo(&state, "u1").await;

        let err = create_share_link(State(state), HeaderMap::new(), Path(album.id), None)
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn past_expiry_is_rejected_at_mint_time() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(dir.path()).await;
        let album = seed_album_with_photo(&state, "u1").await;

        let req = CreateShareLinkReq {
            expires_at: Some(Utc::now() - chrono::Duration::hours(1)),
        };
        let err = create_share_link(
            State(state),
            identity_headers("u1"),
            Path(album.id),
            Some(Json(req)),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }
}
