//! Lookup adapter over the volatile cache and the persistent store.
//!
//! Lookups never fail: missing metadata, missing files and store errors all
//! read as a miss.

use std::num::NonZeroUsize;
use std::sync::Mutex;

use lru::LruCache;

use satchel_core::{CacheDb, CacheItem, Error, FileStore, ItemType, StoredResponse};

use crate::request::CacheRequest;

/// Short-lived, in-process response cache consulted before the store.
pub trait VolatileCache: Send + Sync {
    fn get(&self, url: &str) -> Option<StoredResponse>;
    fn store(&self, url: &str, response: StoredResponse);
}

/// LRU-bounded [`VolatileCache`].
#[derive(Debug)]
pub struct MemoryCache {
    entries: Mutex<LruCache<String, StoredResponse>>,
}

impl MemoryCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self { entries: Mutex::new(LruCache::new(capacity)) }
    }
}

impl VolatileCache for MemoryCache {
    fn get(&self, url: &str) -> Option<StoredResponse> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.get(url).cloned()
    }

    fn store(&self, url: &str, response: StoredResponse) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.put(url.to_string(), response);
    }
}

/// A fetch in progress, as seen by the lookup adapter.
#[derive(Debug, Clone, Default)]
pub struct PendingFetch {
    /// The request the fetch was started with. Absent for fetches that were
    /// created from a bare URL.
    pub original_request: Option<CacheRequest>,
    /// The request after redirects.
    pub current_request: Option<CacheRequest>,
}

/// Pick the stored item to serve when the exact variant is missing.
///
/// Images use the downloaded numeric variant nearest to the requested width,
/// preferring the larger on ties; without a numeric request the largest is
/// used. Articles use any downloaded item for the key.
pub fn fallback_item<'a>(item_type: ItemType, requested: Option<&str>, items: &'a [CacheItem]) -> Option<&'a CacheItem> {
    let mut downloaded = items.iter().filter(|item| item.is_downloaded);

    match item_type {
        ItemType::Article => downloaded.next(),
        ItemType::Image => {
            let sized: Vec<(u64, &CacheItem)> = downloaded
                .clone()
                .filter_map(|item| item.variant.as_deref()?.parse().ok().map(|width| (width, item)))
                .collect();

            let Some(best) = (match requested.and_then(|v| v.parse::<u64>().ok()) {
                Some(target) => sized
                    .iter()
                    .min_by_key(|(width, _)| (width.abs_diff(target), std::cmp::Reverse(*width))),
                None => sized.iter().max_by_key(|(width, _)| *width),
            }) else {
                return downloaded.next();
            };
            Some(best.1)
        }
    }
}

/// Serves cacheable requests from memory first, then from disk.
#[derive(Debug)]
pub struct PersistentUrlCache<V = MemoryCache> {
    volatile: V,
    db: CacheDb,
    store: FileStore,
}

impl<V: VolatileCache> PersistentUrlCache<V> {
    pub fn new(volatile: V, db: CacheDb, store: FileStore) -> Self {
        Self { volatile, db, store }
    }

    pub async fn cached_response(&self, request: &CacheRequest) -> Option<StoredResponse> {
        if let Some(response) = self.volatile.get(request.url.as_str()) {
            return Some(response);
        }
        self.persisted_response(request).await
    }

    /// Lookup for an in-flight fetch, keyed by the request it started with.
    pub async fn cached_response_for_task(&self, task: &PendingFetch) -> Option<StoredResponse> {
        let request = task.original_request.as_ref()?;
        self.cached_response(request).await
    }

    /// Remember a response for this process only; the persistent store is
    /// written by the file writer.
    pub fn store_cached_response(&self, request: &CacheRequest, response: StoredResponse) {
        self.volatile.store(request.url.as_str(), response);
    }

    async fn persisted_response(&self, request: &CacheRequest) -> Option<StoredResponse> {
        match self.try_persisted_response(request).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(url = %request.url, error = %e, "persistent cache lookup failed");
                None
            }
        }
    }

    async fn try_persisted_response(&self, request: &CacheRequest) -> Result<Option<StoredResponse>, Error> {
        let Some(item_key) = request.item_key() else {
            return Ok(None);
        };
        let item_type = request.item_type();
        let variant = request.variant();

        if let Some(response) = self.store.read(item_type, item_key, variant).await? {
            return Ok(Some(response));
        }

        let items = self.db.all_variant_items(item_key).await?;
        let Some(fallback) = fallback_item(item_type, variant, &items) else {
            return Ok(None);
        };

        tracing::debug!(item_key, requested = ?variant, served = ?fallback.variant, "serving fallback variant");
        self.store.read(item_type, item_key, fallback.variant.as_deref()).await
    }
}
