//! Ties the article writer to the file writer.
//!
//! The writer records what a group needs; the controller then downloads the
//! recorded items, tracked under the same group key so one cancel stops both.

use std::sync::Arc;

use tokio::task::JoinSet;
use url::Url;

use satchel_core::{CacheDb, DensityClass, Error, FileStore, GroupStatus};

use crate::fetcher::ResourceFetcher;
use crate::file_writer::{CacheFileWriter, FileWriter};
use crate::request::CacheRequest;
use crate::tracker::TaskTracker;
use crate::writer::{ArticleCacheWriter, ImageCacheWriter};

/// Outcome of downloading a set of requests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadSummary {
    pub requested: usize,
    pub written: usize,
    /// `(url, error)` for every failed download.
    pub failed: Vec<(String, String)>,
}

/// Populates, downloads and removes cache groups.
#[derive(Debug)]
pub struct CacheController<F> {
    writer: ArticleCacheWriter<F>,
    file_writer: Arc<CacheFileWriter<F>>,
    tracker: Arc<TaskTracker>,
    db: CacheDb,
    store: FileStore,
}

impl<F: ResourceFetcher> CacheController<F> {
    pub fn new(fetcher: Arc<F>, db: CacheDb, store: FileStore, density: DensityClass) -> Self {
        let tracker = Arc::new(TaskTracker::new());
        let file_writer = Arc::new(CacheFileWriter::new(Arc::clone(&fetcher), db.clone(), store.clone()));
        let images = ImageCacheWriter::new(db.clone(), file_writer.clone(), Arc::clone(&tracker));
        let writer = ArticleCacheWriter::new(fetcher, db.clone(), Arc::clone(&tracker), images, density);
        Self { writer, file_writer, tracker, db, store }
    }

    pub fn writer(&self) -> &ArticleCacheWriter<F> {
        &self.writer
    }

    /// Record an article group and download its must-have items.
    pub async fn add(&self, article_url: &Url, group_key: &str) -> Result<DownloadSummary, Error> {
        let requests = self.writer.add(article_url, group_key).await?;
        Ok(self.download(requests, group_key).await)
    }

    /// Download every item of the group that is not downloaded yet.
    pub async fn download_group(&self, group_key: &str) -> Result<DownloadSummary, Error> {
        let items = self.db.group_items(group_key).await?;
        let requests = items
            .iter()
            .filter(|entry| !entry.item.is_downloaded)
            .map(|entry| CacheRequest::for_item(&entry.item))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(self.download(requests, group_key).await)
    }

    async fn download(&self, requests: Vec<CacheRequest>, group_key: &str) -> DownloadSummary {
        let mut summary = DownloadSummary { requested: requests.len(), ..Default::default() };

        let mut downloads = JoinSet::new();
        for request in requests {
            let tracker = Arc::clone(&self.tracker);
            let file_writer = Arc::clone(&self.file_writer);
            let group_key = group_key.to_string();
            downloads.spawn(async move {
                let url = request.url.to_string();
                let result = tracker
                    .spawn_tracked(&group_key, async move { file_writer.write(&request).await })
                    .await;
                (url, result)
            });
        }

        while let Some(joined) = downloads.join_next().await {
            match joined {
                Ok((_, Ok(()))) => summary.written += 1,
                Ok((url, Err(e))) => {
                    tracing::warn!(group_key, url = %url, error = %e, "download failed");
                    summary.failed.push((url, e.to_string()));
                }
                Err(e) => summary.failed.push((String::new(), e.to_string())),
            }
        }

        tracing::info!(group_key, written = summary.written, failed = summary.failed.len(), "group download finished");
        summary
    }

    pub async fn status(&self, group_key: &str) -> Result<Option<GroupStatus>, Error> {
        self.db.group_status(group_key).await
    }

    pub async fn all_downloaded(&self, group_key: &str) -> Result<bool, Error> {
        self.writer.all_downloaded(group_key).await
    }

    pub fn cancel(&self, group_key: &str) -> usize {
        self.writer.cancel(group_key)
    }

    /// Cancel and delete a group along with the items no other group uses,
    /// then remove their stored files. Returns the number of deleted items.
    pub async fn remove(&self, group_key: &str) -> Result<u64, Error> {
        self.cancel(group_key);
        let Some(deleted) = self.db.remove_group(group_key).await? else {
            return Ok(0);
        };

        for item in &deleted {
            if let Err(e) = self
                .store
                .remove(item.item_type, &item.item_key, item.variant.as_deref())
                .await
            {
                tracing::warn!(group_key, item_key = %item.item_key, error = %e, "failed to remove stored files");
            }
        }
        tracing::info!(group_key, deleted = deleted.len(), "group removed");
        Ok(deleted.len() as u64)
    }
}
