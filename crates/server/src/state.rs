//! Shared state handed to every tool call.

use std::sync::Arc;

use satchel_client::{CacheController, FetchConfig, MemoryCache, PersistentUrlCache, WikiFetcher};
use satchel_core::{AppConfig, CacheDb, Error, FileStore};

/// Cache controller and lookup adapter over one database and file store.
#[derive(Debug, Clone)]
pub struct AppState {
    pub controller: Arc<CacheController<WikiFetcher>>,
    pub lookup: Arc<PersistentUrlCache>,
}

impl AppState {
    /// Open the database and file store named by the configuration.
    pub async fn open(config: &AppConfig) -> Result<Self, Error> {
        let db = CacheDb::open(&config.db_path).await?;
        Self::with_db(config, db).await
    }

    pub async fn with_db(config: &AppConfig, db: CacheDb) -> Result<Self, Error> {
        let store = FileStore::open(&config.files_dir).await?;
        let fetcher = Arc::new(WikiFetcher::new(FetchConfig::from(config))?);

        let controller = CacheController::new(fetcher, db.clone(), store.clone(), config.density());
        let lookup = PersistentUrlCache::new(MemoryCache::new(config.memory_cache_entries), db, store);

        Ok(Self { controller: Arc::new(controller), lookup: Arc::new(lookup) })
    }
}
