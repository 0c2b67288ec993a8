//! Core data models for the photo vault.
//!
//! `key` holds the structured storage-key type shared by the upload path and
//! the thumbnail pipeline; `photo`, `album`, and `share_link` map to
//! record-store tables via `sqlx::FromRow` and serialize as JSON via `serde`.

pub mod album;
pub mod key;
pub mod photo;
pub mod share_link;
