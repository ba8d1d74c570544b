//! A browsing session: one gateway, one size cache, and the invalidation
//! that keeps them consistent.
//!
//! Every mutating call (upload, delete, folder creation) invalidates the
//! cached sizes it may have changed before returning.

use super::{
    Gateway, GatewayResult,
    browser::DirectoryView,
    folder_size::{FolderSize, FolderSizeAggregator, SizeCache},
    upload::{ProgressFn, UploadMode, UploadOrchestrator, UploadResult, UploadTask},
};
use crate::models::listing::{CreateFolderResponse, DeleteResponse, folder_marker_key};
use std::{collections::BTreeSet, sync::Arc};
use tracing::info;

#[derive(Clone)]
pub struct DriveSession {
    gateway: Arc<dyn Gateway>,
    cache: Arc<SizeCache>,
    uploads: UploadOrchestrator,
    sizes: FolderSizeAggregator,
}

impl DriveSession {
    pub fn new(gateway: Arc<dyn Gateway>) -> Self {
        let cache = Arc::new(SizeCache::new());
        Self {
            uploads: UploadOrchestrator::new(gateway.clone()),
            sizes: FolderSizeAggregator::new(gateway.clone(), cache.clone()),
            gateway,
            cache,
        }
    }

    pub fn cache(&self) -> &Arc<SizeCache> {
        &self.cache
    }

    pub fn gateway(&self) -> &Arc<dyn Gateway> {
        &self.gateway
    }

    /// List `prefix` and decorate folders with already-known sizes.
    pub async fn browse(&self, prefix: &str) -> GatewayResult<DirectoryView> {
        let listing = self.gateway.list(prefix).await?;
        Ok(DirectoryView::from_listing(prefix, listing).with_cached_sizes(&self.cache))
    }

    pub async fn folder_size(&self, prefix: &str) -> FolderSize {
        self.sizes.folder_size(prefix).await
    }

    pub async fn folder_sizes(&self, prefixes: &[String]) -> Vec<(String, FolderSize)> {
        self.sizes.folder_sizes(prefixes).await
    }

    /// Upload `tasks`, then invalidate the sizes of every target folder when
    /// anything landed.
    pub async fn upload(
        &self,
        tasks: Vec<UploadTask>,
        mode: UploadMode,
        progress: Option<&ProgressFn<'_>>,
    ) -> Vec<UploadResult> {
        let keys: Vec<String> = tasks.iter().map(|t| t.target_key().to_string()).collect();
        let results = self.uploads.upload(tasks, mode, progress).await;

        if results.iter().any(UploadResult::is_success) {
            for key in keys.iter().collect::<BTreeSet<_>>() {
                self.cache.invalidate(key);
            }
        }
        results
    }

    /// The cache is invalidated even when the call fails: the gateway may
    /// have applied the delete before the error reached us.
    pub async fn delete(&self, key: &str) -> GatewayResult<DeleteResponse> {
        let result = self.gateway.delete(key).await;
        self.cache.invalidate(key);
        let response = result?;
        info!(key, "deleted");
        Ok(response)
    }

    pub async fn create_folder(
        &self,
        folder_name: &str,
        parent_path: &str,
    ) -> GatewayResult<CreateFolderResponse> {
        let result = self.gateway.create_folder(folder_name, parent_path).await;
        self.cache
            .invalidate(&folder_marker_key(parent_path, folder_name));
        let response = result?;
        info!(folder = %response.folder_path, "folder created");
        Ok(response)
    }

    pub fn download_url(&self, key: &str) -> String {
        self.gateway.download_url(key)
    }
}
