//! src/services/record_service.rs
//!
//! RecordService — SQLite-backed storage for photo and album records. Every
//! query is scoped by the caller's owner id; listings page newest-first with
//! opaque base64 cursors.
//!
//! A photo record is written when the upload finishes and carries the
//! *predicted* thumbnail key. Nothing here waits on, or is updated by, the
//! thumbnail pipeline.

use crate::models::{
    album::Album,
    photo::{MediaType, Photo},
    share_link::ShareLink,
};
use base64::{Engine as _, engine::general_purpose};
use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, SqlitePool, sqlite::Sqlite, types::Json};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("photo `{0}` not found")]
    PhotoNotFound(Uuid),
    #[error("album `{0}` not found")]
    AlbumNotFound(Uuid),
    #[error("share link `{0}` not found")]
    ShareLinkNotFound(Uuid),
    #[error("share link `{0}` has expired")]
    ShareLinkExpired(Uuid),
    #[error("invalid pagination cursor")]
    InvalidCursor,
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

pub type RecordResult<T> = Result<T, RecordError>;

/// Fields the upload orchestrator supplies when creating a photo record.
#[derive(Clone, Debug)]
pub struct NewPhoto {
    pub owner_id: String,
    pub album_id: Option<Uuid>,
    pub s3_key: String,
    pub thumbnail_key: String,
    pub original_filename: String,
    pub caption: Option<String>,
    pub tags: Vec<String>,
    pub source: Option<String>,
    pub media_type: MediaType,
    pub width: Option<i64>,
    pub height: Option<i64>,
    pub file_size: i64,
    pub duration: Option<f64>,
}

#[derive(Clone, Debug, Default)]
pub struct ListPhotosParams {
    pub album_id: Option<Uuid>,
    pub cursor: Option<String>,
    pub limit: usize,
}

#[derive(Debug)]
pub struct PhotoPage {
    pub photos: Vec<Photo>,
    pub next_cursor: Option<String>,
}

const PHOTO_COLUMNS: &str = "id, owner_id, album_id, s3_key, thumbnail_key, original_filename, \
     caption, tags, source, media_type, width, height, file_size, duration, created_at";

const ALBUM_COLUMNS: &str =
    "id, owner_id, name, description, cover_photo_id, photo_count, created_at";

#[derive(Clone)]
pub struct RecordService {
    /// Shared SQLite connection pool.
    pub db: Arc<SqlitePool>,
}

impl RecordService {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }

    /// Insert a photo record and bump the owning album's counter.
    ///
    /// When `album_id` is set, the album must exist and belong to the same
    /// owner; the whole operation runs in one transaction. The first photo
    /// added to an album becomes its cover unless one was already picked.
    pub async fn create_photo(&self, new: NewPhoto) -> RecordResult<Photo> {
        let mut tx = self.db.begin().await?;
        let photo_id = Uuid::new_v4();

        if let Some(album_id) = new.album_id {
            let updated = sqlx::query(
                "UPDATE albums SET photo_count = photo_count + 1, \
                 cover_photo_id = COALESCE(cover_photo_id, ?) \
                 WHERE id = ? AND owner_id = ?",
            )
            .bind(photo_id)
            .bind(album_id)
            .bind(&new.owner_id)
            .execute(&mut *tx)
            .await?;
            if updated.rows_affected() == 0 {
                return Err(RecordError::AlbumNotFound(album_id));
            }
        }

        let photo = Photo {
            id: photo_id,
            owner_id: new.owner_id,
            album_id: new.album_id,
            s3_key: new.s3_key,
            thumbnail_key: new.thumbnail_key,
            original_filename: new.original_filename,
            caption: new.caption,
            tags: Json(new.tags),
            source: new.source,
            media_type: new.media_type,
            width: new.width,
            height: new.height,
            file_size: new.file_size,
            duration: new.duration,
            created_at: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO photos (id, owner_id, album_id, s3_key, thumbnail_key, original_filename, \
             caption, tags, source, media_type, width, height, file_size, duration, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(photo.id)
        .bind(&photo.owner_id)
        .bind(photo.album_id)
        .bind(&photo.s3_key)
        .bind(&photo.thumbnail_key)
        .bind(&photo.original_filename)
        .bind(&photo.caption)
        .bind(&photo.tags)
        .bind(&photo.source)
        .bind(photo.media_type)
        .bind(photo.width)
        .bind(photo.height)
        .bind(photo.file_size)
        .bind(photo.duration)
        .bind(photo.created_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(photo)
    }

    /// Fetch a single photo owned by `owner`.
    pub async fn get_photo(&self, owner: &str, id: Uuid) -> RecordResult<Photo> {
        let query = format!("SELECT {PHOTO_COLUMNS} FROM photos WHERE id = ? AND owner_id = ?");
        sqlx::query_as::<_, Photo>(&query)
            .bind(id)
            .bind(owner)
            .fetch_one(&*self.db)
            .await
            .map_err(|err| match err {
                sqlx::Error::RowNotFound => RecordError::PhotoNotFound(id),
                other => RecordError::Sqlx(other),
            })
    }

    /// List photos newest-first with cursor pagination.
    ///
    /// Fetches one row past the limit to learn whether more pages exist;
    /// the returned cursor encodes the last row's position.
    pub async fn list_photos(
        &self,
        owner: &str,
        params: ListPhotosParams,
    ) -> RecordResult<PhotoPage> {
        let limit = params.limit.clamp(1, 100);
        let fetch_limit = limit + 1;

        let mut builder = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {PHOTO_COLUMNS} FROM photos WHERE owner_id = "
        ));
        builder.push_bind(owner);

        if let Some(album_id) = params.album_id {
            builder.push(" AND album_id = ");
            builder.push_bind(album_id);
        }

        if let Some(token) = &params.cursor {
            let (created_at, id) = decode_cursor(token)?;
            builder.push(" AND (created_at < ");
            builder.push_bind(created_at);
            builder.push(" OR (created_at = ");
            builder.push_bind(created_at);
            builder.push(" AND id < ");
            builder.push_bind(id);
            builder.push("))");
        }

        builder.push(" ORDER BY created_at DESC, id DESC LIMIT ");
        builder.push_bind(fetch_limit as i64);

        let mut photos: Vec<Photo> = builder.build_query_as().fetch_all(&*self.db).await?;

        let mut next_cursor = None;
        if photos.len() == fetch_limit {
            photos.truncate(limit);
            if let Some(last) = photos.last() {
                next_cursor = Some(encode_cursor(last.created_at, last.id));
            }
        }

        Ok(PhotoPage { photos, next_cursor })
    }

    /// Create an empty album for `owner`.
    pub async fn create_album(
        &self,
        owner: &str,
        name: &str,
        description: Option<String>,
    ) -> RecordResult<Album> {
        let album = Album {
            id: Uuid::new_v4(),
            owner_id: owner.to_string(),
            name: name.to_string(),
            description,
            cover_photo_id: None,
            photo_count: 0,
            created_at: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO albums (id, owner_id, name, description, cover_photo_id, photo_count, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(album.id)
        .bind(&album.owner_id)
        .bind(&album.name)
        .bind(&album.description)
        .bind(album.cover_photo_id)
        .bind(album.photo_count)
        .bind(album.created_at)
        .execute(&*self.db)
        .await?;

        Ok(album)
    }

    /// Fetch a single album owned by `owner`.
    pub async fn get_album(&self, owner: &str, id: Uuid) -> RecordResult<Album> {
        let query = format!("SELECT {ALBUM_COLUMNS} FROM albums WHERE id = ? AND owner_id = ?");
        sqlx::query_as::<_, Album>(&query)
            .bind(id)
            .bind(owner)
            .fetch_one(&*self.db)
            .await
            .map_err(|err| match err {
                sqlx::Error::RowNotFound => RecordError::AlbumNotFound(id),
                other => RecordError::Sqlx(other),
            })
    }

    /// List all albums for `owner`, newest first.
    pub async fn list_albums(&self, owner: &str) -> RecordResult<Vec<Album>> {
        let query =
            format!("SELECT {ALBUM_COLUMNS} FROM albums WHERE owner_id = ? ORDER BY created_at DESC");
        Ok(sqlx::query_as::<_, Album>(&query)
            .bind(owner)
            .fetch_all(&*self.db)
            .await?)
    }

    /// Mint a share link for an album `owner` owns.
    pub async fn create_share_link(
        &self,
        owner: &str,
        album_id: Uuid,
        expires_at: Option<DateTime<Utc>>,
    ) -> RecordResult<ShareLink> {
        // Ownership gate; a caller must not be able to publish someone
        // else's album.
        self.get_album(owner, album_id).await?;

        let link = ShareLink {
            id: Uuid::new_v4(),
            album_id,
            created_by: owner.to_string(),
            expires_at,
            view_count: 0,
            created_at: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO share_links (id, album_id, created_by, expires_at, view_count, created_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(link.id)
        .bind(link.album_id)
        .bind(&link.created_by)
        .bind(link.expires_at)
        .bind(link.view_count)
        .bind(link.created_at)
        .execute(&*self.db)
        .await?;

        Ok(link)
    }

    /// Resolve a share link for the public gallery: the only read path that
    /// is not scoped to the caller's identity.
    ///
    /// Returns the link and the album it exposes, after checking expiry and
    /// counting the view. The returned `view_count` includes this resolve.
    pub async fn resolve_share_link(&self, id: Uuid) -> RecordResult<(ShareLink, Album)> {
        let mut link = sqlx::query_as::<_, ShareLink>(
            "SELECT id, album_id, created_by, expires_at, view_count, created_at \
             FROM share_links WHERE id = ?",
        )
        .bind(id)
        .fetch_one(&*self.db)
        .await
        .map_err(|err| match err {
            sqlx::Error::RowNotFound => RecordError::ShareLinkNotFound(id),
            other => RecordError::Sqlx(other),
        })?;

        if link.is_expired(Utc::now()) {
            return Err(RecordError::ShareLinkExpired(id));
        }

        sqlx::query("UPDATE share_links SET view_count = view_count + 1 WHERE id = ?")
            .bind(id)
            .execute(&*self.db)
            .await?;
        link.view_count += 1;

        let query = format!("SELECT {ALBUM_COLUMNS} FROM albums WHERE id = ?");
        let album = sqlx::query_as::<_, Album>(&query)
            .bind(link.album_id)
            .fetch_one(&*self.db)
            .await
            .map_err(|err| match err {
                sqlx::Error::RowNotFound => RecordError::AlbumNotFound(link.album_id),
                other => RecordError::Sqlx(other),
            })?;

        Ok((link, album))
    }
}

fn encode_cursor(created_at: DateTime<Utc>, id: Uuid) -> String {
    general_purpose::STANDARD.encode(format!("{}|{}", created_at.to_rfc3339(), id))
}

fn decode_cursor(token: &str) -> RecordResult<(DateTime<Utc>, Uuid)> {
    let raw = general_purpose::STANDARD
        .decode(token)
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .ok_or(RecordError::InvalidCursor)?;
    let (ts, id) = raw.split_once('|').ok_or(RecordError::InvalidCursor)?;
    let created_at = DateTime::parse_from_rfc3339(ts)
        .map_err(|_| RecordError::InvalidCursor)?
        .with_timezone(&Utc);
    let id = id.parse().map_err(|_| RecordError::InvalidCursor)?;
    Ok((created_at, id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn service() -> RecordService {
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
        RecordService::new(Arc::new(pool))
    }

    fn new_photo(owner: &str, key: &str) -> NewPhoto {
        NewPhoto {
            owner_id: owner.to_string(),
            album_id: None,
            s3_key: key.to_string(),
            thumbnail_key: key.replacen("photos/", "thumbnails/", 1),
            original_filename: "pic.jpg".into(),
            caption: None,
            tags: vec!["trip".into()],
            source: Some("web".into()),
            media_type: MediaType::Image,
            width: Some(800),
            height: Some(600),
            file_size: 1234,
            duration: None,
        }
    }

    #[tokio::test]
    async fn create_and_fetch_photo() {
        let records = service().await;
        let created = records
            .create_photo(new_photo("u1", "photos/u1/a.jpg"))
            .await
            .unwrap();

        let fetched = records.get_photo("u1", created.id).await.unwrap();
        assert_eq!(fetched.s3_key, "photos/u1/a.jpg");
        assert_eq!(fetched.thumbnail_key, "thumbnails/u1/a.jpg");
        assert_eq!(fetched.tags.0, vec!["trip".to_string()]);
        assert_eq!(fetched.media_type, MediaType::Image);
    }

    #[tokio::test]
    async fn photos_are_owner_scoped() {
        let records = service().await;
        let created = records
            .create_photo(new_photo("u1", "photos/u1/a.jpg"))
            .await
            .unwrap();

        let err = records.get_photo("u2", created.id).await.unwrap_err();
        assert!(matches!(err, RecordError::PhotoNotFound(_)));
    }

    #[tokio::test]
    async fn pagination_walks_all_photos_without_repeats() {
        let records = service().await;
        for i in 0..5 {
            records
                .create_photo(new_photo("u1", &format!("photos/u1/{i}.jpg")))
                .await
                .unwrap();
        }

        let mut seen = Vec::new();
        let mut cursor = None;
        loop {
            let page = records
                .list_photos(
                    "u1",
                    ListPhotosParams {
                        album_id: None,
                        cursor: cursor.take(),
                        limit: 2,
                    },
                )
                .await
                .unwrap();
            seen.extend(page.photos.iter().map(|p| p.s3_key.clone()));
            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        assert_eq!(seen.len(), 5);
        let mut deduped = seen.clone();
        deduped.dedup();
        assert_eq!(deduped.len(), 5);
    }

    #[tokio::test]
    async fn garbage_cursor_is_rejected() {
        let records = service().await;
        let err = records
            .list_photos(
                "u1",
                ListPhotosParams {
                    cursor: Some("!!not-base64!!".into()),
                    limit: 10,
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RecordError::InvalidCursor));
    }

    #[tokio::test]
    async fn album_counter_tracks_photo_creation() {
        let records = service().await;
        let album = records.create_album("u1", "Trip", None).await.unwrap();

        let mut photo = new_photo("u1", "photos/u1/a.jpg");
        photo.album_id = Some(album.id);
        records.create_photo(photo).await.unwrap();

        let album = records.get_album("u1", album.id).await.unwrap();
        assert_eq!(album.photo_count, 1);
    }

    #[tokio::test]
    async fn adding_to_foreign_album_fails() {
        let records = service().await;
        let album = records.create_album("u1", "Trip", None).await.unwrap();

        let mut photo = new_photo("u2", "photos/u2/a.jpg");
        photo.album_id = Some(album.id);
        let err = records.create_photo(photo).await.unwrap_err();
        assert!(matches!(err, RecordError::AlbumNotFound(_)));
    }

    #[tokio::test]
    async fn album_listing_filters_photos() {
        let records = service().await;
        let album = records.create_album("u1", "Trip", None).await.unwrap();

        let mut in_album = new_photo("u1", "photos/u1/in.jpg");
        in_album.album_id = Some(album.id);
        records.create_photo(in_album).await.unwrap();
        records
            .create_photo(new_photo("u1", "photos/u1/out.jpg"))
            .await
            .unwrap();

        let page = records
            .list_photos(
                "u1",
                ListPhotosParams {
                    album_id: Some(album.id),
                    cursor: None,
                    limit: 10,
                },
            )
            .await
            .unwrap();
        assert_eq!(page.photos.len(), 1);
        assert_eq!(page.photos[0].s3_key, "photos/u1/in.jpg");
    }

    #[tokio::test]
    async fn first_photo_becomes_the_album_cover() {
        let records = service().await;
        let album = records.create_album("u1", "Trip", None).await.unwrap();
        assert_eq!(album.cover_photo_id, None);

        let mut first = new_photo("u1", "photos/u1/first.jpg");
        first.album_id = Some(album.id);
        let first = records.create_photo(first).await.unwrap();

        let mut second = new_photo("u1", "photos/u1/second.jpg");
        second.album_id = Some(album.id);
        records.create_photo(second).await.unwrap();

        let album = records.get_album("u1", album.id).await.unwrap();
        assert_eq!(album.cover_photo_id, Some(first.id));
    }

    #[tokio::test]
    async fn share_link_resolves_and_counts_views() {
        let records = service().await;
        let album = records.create_album("u1", "Trip", None).await.unwrap();
        let link = records.create_share_link("u1", album.id, None).await.unwrap();
        assert_eq!(link.view_count, 0);

        let (resolved, shared_album) = records.resolve_share_link(link.id).await.unwrap();
        assert_eq!(resolved.view_count, 1);
        assert_eq!(shared_album.id, album.id);
        assert_eq!(shared_album.owner_id, "u1");

        let (resolved, _) = records.resolve_share_link(link.id).await.unwrap();
        assert_eq!(resolved.view_count, 2);
    }

    #[tokio::test]
    async fn sharing_a_foreign_album_fails() {
        let records = service().await;
        let album = records.create_album("u1", "Trip", None).await.unwrap();

        let err = records
            .create_share_link("u2", album.id, None)
            .await
            .unwrap_err();
        assert!(matches!(err, RecordError::AlbumNotFound(_)));
    }

    #[tokio::test]
    async fn expired_share_link_does_not_resolve() {
        let records = service().await;
        let album = records.create_album("u1", "Trip", None).await.unwrap();
        let expired = Utc::now() - chrono::Duration::hours(1);
        let link = records
            .create_share_link("u1", album.id, Some(expired))
            .await
            .unwrap();

        let err = records.resolve_share_link(link.id).await.unwrap_err();
        assert!(matches!(err, RecordError::ShareLinkExpired(_)));
    }

    #[tokio::test]
    async fn unknown_share_link_is_not_found() {
        let records = service().await;
        let err = records.resolve_share_link(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, RecordError::ShareLinkNotFound(_)));
    }
}
