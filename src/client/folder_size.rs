//! Recursive folder sizes over a delimiter-listed key space.
//!
//! A folder's size is the sum of its direct files plus the sizes of its
//! direct sub-prefixes, one listing per level. Completed totals are memoized
//! in a [`SizeCache`] shared by every computation of a session. Mutating
//! operations invalidate the cache explicitly; each invalidation bumps a
//! generation counter, and a computation that started under an older
//! generation does not write its totals back.

use super::Gateway;
use futures::future::{BoxFuture, FutureExt, join_all};
use parking_lot::Mutex;
use std::{collections::HashMap, sync::Arc};
use tracing::{debug, warn};

#[derive(Debug, Default)]
struct CacheState {
    generation: u64,
    sizes: HashMap<String, u64>,
}

/// Prefix -> aggregate byte size, with explicit invalidation.
#[derive(Debug, Default)]
pub struct SizeCache {
    state: Mutex<CacheState>,
}

impl SizeCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, prefix: &str) -> Option<u64> {
        self.state.lock().sizes.get(prefix).copied()
    }

    pub fn generation(&self) -> u64 {
        self.state.lock().generation
    }

    /// Store `size` for `prefix` unless the cache was invalidated since
    /// `generation` was read. Returns whether the value was stored.
    pub fn insert_if_current(&self, prefix: &str, size: u64, generation: u64) -> bool {
        let mut state = self.state.lock();
        if state.generation != generation {
            return false;
        }
        state.sizes.insert(prefix.to_string(), size);
        true
    }

    /// Forget every cached total that `key` contributes to: the root, each
    /// ancestor prefix of `key`, and `key` itself with everything below it
    /// when it is a prefix.
    pub fn invalidate(&self, key: &str) {
        let mut state = self.state.lock();
        state.generation += 1;
        let key_is_prefix = key.ends_with('/') || key.is_empty();
        state.sizes.retain(|prefix, _| {
            !(key.starts_with(prefix.as_str()) || (key_is_prefix && prefix.starts_with(key)))
        });
    }

    pub fn invalidate_all(&self) {
        let mut state = self.state.lock();
        state.generation += 1;
        state.sizes.clear();
    }

    pub fn snapshot(&self) -> HashMap<String, u64> {
        self.state.lock().sizes.clone()
    }

    pub fn len(&self) -> usize {
        self.state.lock().sizes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Outcome of a size computation.
///
/// A prefix whose listing failed contributes 0 and is recorded in
/// `unreadable`, so an empty folder (`bytes == 0`, complete) can be told
/// apart from one that could not be read.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FolderSize {
    pub bytes: u64,
    pub unreadable: Vec<String>,
}

impl FolderSize {
    pub fn exact(bytes: u64) -> Self {
        Self {
            bytes,
            unreadable: Vec::new(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.unreadable.is_empty()
    }

    fn absorb(&mut self, other: FolderSize) {
        self.bytes += other.bytes;
        self.unreadable.extend(other.unreadable);
    }
}

/// Called with the cache after every stored total.
pub type CacheObserver = dyn Fn(&SizeCache) + Send + Sync;

#[derive(Clone)]
pub struct FolderSizeAggregator {
    gateway: Arc<dyn Gateway>,
    cache: Arc<SizeCache>,
    observer: Option<Arc<CacheObserver>>,
}

impl FolderSizeAggregator {
    pub fn new(gateway: Arc<dyn Gateway>, cache: Arc<SizeCache>) -> Self {
        Self {
            gateway,
            cache,
            observer: None,
        }
    }

    pub fn with_observer(mut self, observer: Arc<CacheObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn cache(&self) -> &Arc<SizeCache> {
        &self.cache
    }

    /// Total size of everything under `prefix` (`""` is the whole bucket).
    /// Never fails; see [`FolderSize`].
    pub async fn folder_size(&self, prefix: &str) -> FolderSize {
        let generation = self.cache.generation();
        self.compute(prefix.to_string(), generation).await
    }

    /// Sizes of several prefixes, computed concurrently against the shared
    /// cache. Output order matches `prefixes`.
    pub async fn folder_sizes(&self, prefixes: &[String]) -> Vec<(String, FolderSize)> {
        let sizes = join_all(prefixes.iter().map(|p| self.folder_size(p))).await;
        prefixes.iter().cloned().zip(sizes).collect()
    }

    fn compute(&self, prefix: String, generation: u64) -> BoxFuture<'_, FolderSize> {
        async move {
            if let Some(bytes) = self.cache.get(&prefix) {
                return FolderSize::exact(bytes);
            }

            let listing = match self.gateway.list(&prefix).await {
                Ok(listing) => listing,
                Err(err) => {
                    warn!(prefix = %prefix, error = %err, "folder size unavailable, counting as 0");
                    return FolderSize {
                        bytes: 0,
                        unreadable: vec![prefix],
                    };
                }
            };

            let mut total = FolderSize::exact(listing.files_size());
            for sub in listing.folders {
                if sub.len() <= prefix.len() || !sub.starts_with(prefix.as_str()) {
                    debug!(prefix = %prefix, sub = %sub, "skipping non-descendant prefix");
                    continue;
                }
                total.absorb(self.compute(sub, generation).await);
            }

            if total.is_complete() && self.cache.insert_if_current(&prefix, total.bytes, generation) {
                if let Some(observer) = &self.observer {
                    observer(&self.cache);
                }
            }
            total
        }
        .boxed()
    }
}
