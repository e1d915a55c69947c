//! Downloads cacheable requests into the response store.

use std::sync::Arc;

use async_trait::async_trait;

use satchel_core::{CacheDb, Error, FileStore};

use crate::fetcher::ResourceFetcher;
use crate::request::CacheRequest;

/// Writes the response for one cacheable request.
#[async_trait]
pub trait FileWriter: Send + Sync + 'static {
    async fn write(&self, request: &CacheRequest) -> Result<(), Error>;
}

/// Fetches, stores the response on disk, then marks the item downloaded.
///
/// The item is only marked once both files are in place, so a downloaded
/// item always has a readable response.
#[derive(Debug)]
pub struct CacheFileWriter<F> {
    fetcher: Arc<F>,
    db: CacheDb,
    store: FileStore,
}

impl<F: ResourceFetcher> CacheFileWriter<F> {
    pub fn new(fetcher: Arc<F>, db: CacheDb, store: FileStore) -> Self {
        Self { fetcher, db, store }
    }

    pub fn store(&self) -> &FileStore {
        &self.store
    }
}

#[async_trait]
impl<F: ResourceFetcher> FileWriter for CacheFileWriter<F> {
    async fn write(&self, request: &CacheRequest) -> Result<(), Error> {
        let spec = request.item_spec()?;
        let response = self.fetcher.fetch_bytes(request).await?;
        let etag = response.etag().map(str::to_string);

        if response.not_modified() {
            if !self.store.contains(spec.item_type, &spec.item_key, spec.variant.as_deref()).await {
                return Err(Error::HttpError(format!("not modified but nothing stored for {}", request.url)));
            }
        } else {
            self.store
                .write(spec.item_type, &spec.item_key, spec.variant.as_deref(), &response.into_stored())
                .await?;
        }

        self.db.mark_downloaded(&spec, etag.as_deref()).await?;
        tracing::debug!(item_key = %spec.item_key, variant = ?spec.variant, "item downloaded");
        Ok(())
    }
}
