//! Represents an uploaded media item (photo or video) in the record store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use sqlx::types::Json;
use uuid::Uuid;

/// Whether an original is a still image or a video.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum MediaType {
    Image,
    Video,
}

/// A photo (or video) record.
///
/// References both the original object key and the *expected* thumbnail key.
/// The record is created when the upload finishes, independently of thumbnail
/// generation — the object at `thumbnail_key` may not exist yet, and readers
/// must treat its absence as "not yet generated".
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
pub struct Photo {
    /// Internal UUID for DB indexing.
    pub id: Uuid,

    /// Opaque identity of the owning caller, as issued by the identity
    /// provider. Also the second segment of both storage keys.
    pub owner_id: String,

    /// Album this photo belongs to, if any.
    pub album_id: Option<Uuid>,

    /// Storage key of the original object.
    pub s3_key: String,

    /// Storage key where the derived thumbnail is (or will be) written.
    pub thumbnail_key: String,

    /// Filename as uploaded by the client.
    pub original_filename: String,

    /// Optional user caption.
    pub caption: Option<String>,

    /// Free-form tags, stored as a JSON array.
    pub tags: Json<Vec<String>>,

    /// Where the upload came from (e.g. "web", "share").
    pub source: Option<String>,

    /// Image or video.
    pub media_type: MediaType,

    /// Pixel dimensions, when the client reported them.
    pub width: Option<i64>,
    pub height: Option<i64>,

    /// Size of the original in bytes.
    pub file_size: i64,

    /// Duration in seconds, for videos.
    pub duration: Option<f64>,

    /// When the record was created.
    pub created_at: DateTime<Utc>,
}
