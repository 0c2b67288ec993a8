//! HTTP handlers for the upload orchestrator and the gallery read path.
//!
//! Upload writes the original to the blob store, predicts the thumbnail key
//! (the same mapping the pipeline applies on its side), and creates the
//! photo record. The record therefore exists before the thumbnail does; the
//! read path resolves both URLs and falls back to the original while the
//! thumbnail is still missing.

use crate::{
    errors::AppError,
    handlers::require_identity,
    models::{
        key::MediaKey,
        photo::{MediaType, Photo},
    },
    services::record_service::{ListPhotosParams, NewPhoto},
    state::AppState,
};
use axum::{
    Json,
    extract::{Multipart, Path, Query, State},
    http::HeaderMap,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A photo record with its resolved fetch URLs.
#[derive(Debug, Serialize)]
pub struct PhotoView {
    #[serde(flatten)]
    pub photo: Photo,
    /// URL of the original object.
    pub url: Option<String>,
    /// URL of the thumbnail, falling back to the original while the
    /// thumbnail has not been generated yet.
    pub thumbnail_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListPhotosQuery {
    pub album_id: Option<Uuid>,
    pub cursor: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct PhotoListResponse {
    pub photos: Vec<PhotoView>,
    pub next_cursor: Option<String>,
}

/// POST `/api/photos` — multipart upload.
///
/// Expects a `file` part plus optional `album_id`, `caption`, `tags`
/// (comma-separated), `source`, `width`, `height`, and `duration` fields.
pub async fn upload_photo(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<PhotoView>, AppError> {
    let identity = require_identity(&headers)?;

    let mut file: Option<(String, String, bytes::Bytes)> = None;
    let mut album_id = None;
    let mut caption = None;
    let mut tags = Vec::new();
    let mut source = None;
    let mut width = None;
    let mut height = None;
    let mut duration = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| AppError::bad_request(err.to_string()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let filename = field
                    .file_name()
                    .map(str::to_string)
                    .ok_or_else(|| AppError::bad_request("file part needs a filename"))?;
                let content_type = field
                    .content_type()
                    .map(str::to_string)
                    .unwrap_or_else(|| "application/octet-stream".into());
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|err| AppError::bad_request(err.to_string()))?;
                file = Some((filename, content_type, bytes));
            }
            "album_id" => {
                let text = read_text(field).await?;
                album_id = Some(
                    text.parse::<Uuid>()
                        .map_err(|_| AppError::bad_request("album_id must be a UUID"))?,
                );
            }
            "caption" => caption = Some(read_text(field).await?),
            "tags" => {
                tags = read_text(field)
                    .await?
                    .split(',')
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map(str::to_string)
                    .collect();
            }
            "source" => source = Some(read_text(field).await?),
            "width" => width = Some(parse_number(&read_text(field).await?, "width")?),
            "height" => height = Some(parse_number(&read_text(field).await?, "height")?),
            "duration" => {
                let text = read_text(field).await?;
                duration = Some(
                    text.parse::<f64>()
                        .map_err(|_| AppError::bad_request("duration must be a number"))?,
                );
            }
            _ => {}
        }
    }

    let (filename, content_type, bytes) =
        file.ok_or_else(|| AppError::bad_request("missing file part"))?;

    let media_type = if content_type.starts_with("image/") {
        MediaType::Image
    } else if content_type.starts_with("video/") {
        MediaType::Video
    } else {
        return Err(AppError::bad_request(format!(
            "unsupported content type `{content_type}`"
        )));
    };

    let category_prefix = match media_type {
        MediaType::Image => "photos/",
        MediaType::Video => "videos/",
    };
    let ext = extension_for(&filename, &content_type);
    let key = format!("{category_prefix}{identity}/{}.{ext}", Uuid::new_v4());

    // Predicted from the key before the upload lands; must equal the key the
    // pipeline computes when it processes the creation event.
    let thumbnail_key = MediaKey::parse(&key)
        .and_then(|k| k.thumbnail_key())
        .ok_or_else(|| AppError::internal("generated an unmappable storage key"))?;

    let file_size = bytes.len() as i64;
    state
        .storage
        .put_object(&key, bytes, content_type.clone())
        .await?;

    let photo = state
        .records
        .create_photo(NewPhoto {
            owner_id: identity,
            album_id,
            s3_key: key,
            thumbnail_key,
            original_filename: filename,
            caption,
            tags,
            source,
            media_type,
            width,
            height,
            file_size,
            duration,
        })
        .await?;

    let view = resolve_urls(&state, photo).await?;
    Ok(Json(view))
}

/// GET `/api/photos` — paginated gallery listing for the caller.
pub async fn list_photos(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(q): Query<ListPhotosQuery>,
) -> Result<Json<PhotoListResponse>, AppError> {
    let identity = require_identity(&headers)?;

    let page = state
        .records
        .list_photos(
            &identity,
            ListPhotosParams {
                album_id: q.album_id,
                cursor: q.cursor,
                limit: q.limit.unwrap_or(50),
            },
        )
        .await?;

    let mut photos = Vec::with_capacity(page.photos.len());
    for photo in page.photos {
        photos.push(resolve_urls(&state, photo).await?);
    }

    Ok(Json(PhotoListResponse {
        photos,
        next_cursor: page.next_cursor,
    }))
}

/// GET `/api/photos/{id}` — single record with resolved URLs.
pub async fn get_photo(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<PhotoView>, AppError> {
    let identity = require_identity(&headers)?;
    let photo = state.records.get_photo(&identity, id).await?;
    let view = resolve_urls(&state, photo).await?;
    Ok(Json(view))
}

/// Resolve fetch URLs for a record. A thumbnail that has not been generated
/// yet resolves to the original URL; neither case errors the listing.
pub(crate) async fn resolve_urls(state: &AppState, photo: Photo) -> Result<PhotoView, AppError> {
    let url = state.storage.presigned_url(&photo.s3_key).await?;
    let thumbnail_url = state
        .storage
        .presigned_url(&photo.thumbnail_key)
        .await?
        .or_else(|| url.clone());
    Ok(PhotoView {
        photo,
        url,
        thumbnail_url,
    })
}

async fn read_text(field: axum::extract::multipart::Field<'_>) -> Result<String, AppError> {
    field
        .text()
        .await
        .map_err(|err| AppError::bad_request(err.to_string()))
}

fn parse_number(text: &str, name: &str) -> Result<i64, AppError> {
    text.parse::<i64>()
        .map_err(|_| AppError::bad_request(format!("{name} must be an integer")))
}

/// Pick a storage-key extension: the uploaded filename's extension when it
/// has one, otherwise derived from the content type.
fn extension_for(filename: &str, content_type: &str) -> String {
    if let Some((_, ext)) = filename.rsplit_once('.') {
        if !ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric()) {
            return ext.to_ascii_lowercase();
        }
    }
    match content_type {
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "image/gif" => "gif",
        "image/webp" => "webp",
        "video/mp4" => "mp4",
        "video/quicktime" => "mov",
        "video/webm" => "webm",
        _ => "bin",
    }
    .to_string()
}
