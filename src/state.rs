use crate::services::{record_service::RecordService, storage_service::StorageService};

/// Shared state handed to every handler: the blob store and the record store.
#[derive(Clone)]
pub struct AppState {
    pub storage: StorageService,
    pub records: RecordService,
}
