//! Defines routes for the vault API and direct blob-store access.
//!
//! ## Structure
//! - **Blob store**
//!   - `PUT    /storage/{*key}` — direct client write of an original
//!   - `GET    /storage/{*key}` — download (what resolved URLs point at)
//!
//! - **Records**
//!   - `POST   /api/photos` — multipart upload (blob write + record create)
//!   - `GET    /api/photos` — paginated gallery listing (?album_id=&cursor=&limit=)
//!   - `GET    /api/photos/{id}` — one record with resolved URLs
//!   - `POST   /api/albums`, `GET /api/albums`, `GET /api/albums/{id}`
//!   - `POST   /api/albums/{id}/share` — mint a public share link
//!
//! - **Public**
//!   - `GET    /share/{id}` — shared-album gallery, no identity required
//!
//! The wildcard `*key` allows nested keys like `photos/u1/2025/img.jpg`.

use crate::{
    handlers::{
        album_handlers::{create_album, get_album, list_albums},
        health_handlers::{healthz, readyz},
        photo_handlers::{get_photo, list_photos, upload_photo},
        share_handlers::{create_share_link, view_shared_album},
        storage_handlers::{get_object, upload_object},
    },
    state::AppState,
};
use axum::{
    Router,
    routing::{get, post, put},
};

/// Build and return the router for the vault.
///
/// The router carries shared state (`AppState`) to all handlers.
pub fn routes() -> Router<AppState> {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        // direct blob-store access
        .route("/storage/{*key}", put(upload_object).get(get_object))
        // photo records
        .route("/api/photos", post(upload_photo).get(list_photos))
        .route("/api/photos/{id}", get(get_photo))
        // albums
        .route("/api/albums", post(create_album).get(list_albums))
        .route("/api/albums/{id}", get(get_album))
        .route("/api/albums/{id}/share", post(create_share_link))
        // public share-link gallery
        .route("/share/{id}", get(view_shared_album))
}
