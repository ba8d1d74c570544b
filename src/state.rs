use crate::services::{signing::UrlSigner, storage_service::StorageService};

/// Shared state handed to every gateway handler.
#[derive(Clone)]
pub struct AppState {
    pub storage: StorageService,
    pub signer: UrlSigner,
    /// The one bucket this gateway serves.
    pub bucket: String,
}

impl AppState {
    pub fn new(storage: StorageService, signer: UrlSigner, bucket: impl Into<String>) -> Self {
        Self {
            storage,
            signer,
            bucket: bucket.into(),
        }
    }
}
