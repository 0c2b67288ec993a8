//! Represents an album — a user-owned grouping of photos.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// An album in the record store.
///
/// `photo_count` is a denormalized counter maintained on photo creation.
/// The thumbnail pipeline never touches it.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
pub struct Album {
    /// Internal UUID for DB indexing.
    pub id: Uuid,

    /// Opaque identity of the owning caller.
    pub owner_id: String,

    /// Display name.
    pub name: String,

    /// Optional description.
    pub description: Option<String>,

    /// Photo shown as the album cover, when one has been picked.
    pub cover_photo_id: Option<Uuid>,

    /// Number of photos added to this album.
    pub photo_count: i64,

    /// When the album was created.
    pub created_at: DateTime<Utc>,
}
