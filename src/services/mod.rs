//! Service layer: the blob store, the record store, and the thumbnail
//! pipeline that connects them through object-created events.

pub mod record_service;
pub mod storage_service;
pub mod thumbnail_pipeline;
