//! Public share links for albums.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A share link grants unauthenticated read access to one album.
///
/// The link id is the capability: anyone holding `/share/{id}` can view the
/// album until `expires_at` passes. `view_count` is bumped on every resolve.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
pub struct ShareLink {
    pub id: Uuid,

    /// Album this link exposes.
    pub album_id: Uuid,

    /// Identity that created the link; must own the album.
    pub created_by: String,

    /// When the link stops resolving. `None` means it never expires.
    pub expires_at: Option<DateTime<Utc>>,

    /// Number of times the link has been resolved.
    pub view_count: i64,

    pub created_at: DateTime<Utc>,
}

impl ShareLink {
    /// Whether the link is past its expiry at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn link(expires_at: Option<DateTime<Utc>>) -> ShareLink {
        ShareLink {
            id: Uuid::new_v4(),
            album_id: Uuid::new_v4(),
            created_by: "u1".into(),
            expires_at,
            view_count: 0,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn links_without_expiry_never_expire() {
        assert!(!link(None).is_expired(Utc::now() + Duration::days(3650)));
    }

    #[test]
    fn expiry_is_inclusive_of_the_deadline() {
        let now = Utc::now();
        assert!(link(Some(now)).is_expired(now));
        assert!(!link(Some(now + Duration::seconds(1))).is_expired(now));
        assert!(link(Some(now - Duration::seconds(1))).is_expired(now));
    }
}
