//! Database writers for article and image groups.
//!
//! [`ArticleCacheWriter::add`] discovers everything an article needs offline
//! and records it as one group:
//!
//! 1. Build the content, offline-resource list and media list requests
//! 2. Fetch both lists concurrently, tracked under the group key
//! 3. Commit the must-have items in one transaction
//! 4. Queue the selected image variants for background download
//!
//! Nothing is persisted unless every step up to the commit succeeds.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::task::JoinHandle;
use url::Url;

use satchel_core::keys::database_key;
use satchel_core::{CacheDb, CacheItem, DensityClass, Error, GroupBatch};

use crate::fetcher::{MediaListItem, ResourceFetcher};
use crate::file_writer::FileWriter;
use crate::request::CacheRequest;
use crate::tracker::TaskTracker;

/// Records image requests as nice-to-have items and downloads them.
#[derive(Clone)]
pub struct ImageCacheWriter {
    db: CacheDb,
    file_writer: Arc<dyn FileWriter>,
    tracker: Arc<TaskTracker>,
}

impl ImageCacheWriter {
    pub fn new(db: CacheDb, file_writer: Arc<dyn FileWriter>, tracker: Arc<TaskTracker>) -> Self {
        Self { db, file_writer, tracker }
    }

    /// Add `requests` to the group and download them on a tracked background
    /// task. Failures are logged and never reach the caller.
    pub fn cache_in_background(&self, requests: Vec<CacheRequest>, group_key: &str) -> JoinHandle<()> {
        let db = self.db.clone();
        let file_writer = Arc::clone(&self.file_writer);
        let task_group = group_key.to_string();

        self.tracker.spawn_detached(group_key, async move {
            let mut batch = GroupBatch::new(&task_group);
            let mut queued = Vec::with_capacity(requests.len());
            for request in requests {
                match request.item_spec() {
                    Ok(spec) => {
                        batch = batch.nice_to_have(spec);
                        queued.push(request);
                    }
                    Err(e) => tracing::warn!(url = %request.url, error = %e, "skipping image"),
                }
            }

            if let Err(e) = db.commit_group(batch).await {
                tracing::warn!(group_key = %task_group, error = %e, "failed to record images");
                return;
            }

            for request in &queued {
                if let Err(e) = file_writer.write(request).await {
                    tracing::warn!(group_key = %task_group, url = %request.url, error = %e, "image download failed");
                }
            }
        })
    }
}

impl std::fmt::Debug for ImageCacheWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageCacheWriter").finish_non_exhaustive()
    }
}

/// Populates article groups.
#[derive(Debug)]
pub struct ArticleCacheWriter<F> {
    fetcher: Arc<F>,
    db: CacheDb,
    tracker: Arc<TaskTracker>,
    images: ImageCacheWriter,
    density: DensityClass,
}

impl<F: ResourceFetcher> ArticleCacheWriter<F> {
    pub fn new(
        fetcher: Arc<F>, db: CacheDb, tracker: Arc<TaskTracker>, images: ImageCacheWriter, density: DensityClass,
    ) -> Self {
        Self { fetcher, db, tracker, images, density }
    }

    pub fn tracker(&self) -> &Arc<TaskTracker> {
        &self.tracker
    }

    /// Record everything `article_url` needs offline under `group_key`.
    ///
    /// Returns the must-have requests, in commit order: content, media list,
    /// offline resources, image metadata.
    ///
    /// # Errors
    ///
    /// - `Error::MalformedRequest` if the article URL has no endpoints
    /// - `Error::ListFetchFailed` if either list fetch fails; a media list
    ///   failure is reported in preference to an offline resource failure
    /// - `Error::Cancelled` if the group was cancelled during a list fetch
    /// - `Error::MissingHeader` or a database error if the commit fails
    pub async fn add(&self, article_url: &Url, group_key: &str) -> Result<Vec<CacheRequest>, Error> {
        let content = self.fetcher.content_request(article_url)?;
        let offline_list = self.fetcher.offline_resources_request(article_url)?;
        let media_list = self.fetcher.media_list_request(article_url)?;

        let offline_fetch = {
            let fetcher = Arc::clone(&self.fetcher);
            let request = offline_list.clone();
            self.tracker
                .spawn_tracked(group_key, async move { fetcher.fetch_offline_resources(&request).await })
        };
        let media_fetch = {
            let fetcher = Arc::clone(&self.fetcher);
            let request = media_list.clone();
            self.tracker
                .spawn_tracked(group_key, async move { fetcher.fetch_media_list(&request).await })
        };
        let (offline_result, media_result) = tokio::join!(offline_fetch, media_fetch);

        let media_items = media_result?;
        let resource_urls = offline_result?;

        let mut seen = HashSet::new();
        let image_info: Vec<CacheRequest> = media_items
            .iter()
            .filter(|item| seen.insert(item.title.as_str()))
            .filter_map(|item| self.fetcher.image_info_request(&item.title, article_url))
            .collect();

        let images = self.select_images(&media_items).await?;

        let must_have: Vec<CacheRequest> = [content, media_list]
            .into_iter()
            .chain(resource_urls.into_iter().map(|url| self.fetcher.resource_request(url)))
            .chain(image_info)
            .collect();

        let mut batch = GroupBatch::new(group_key);
        for request in &must_have {
            batch = batch.must_have(request.item_spec()?);
        }
        self.db.commit_group(batch).await?;

        tracing::info!(group_key, must_have = must_have.len(), images = images.len(), "article group recorded");

        if !images.is_empty() {
            self.images.cache_in_background(images, group_key);
        }

        Ok(must_have)
    }

    /// Image requests for the media list, one variant per item key as chosen
    /// by the display density.
    async fn select_images(&self, media_items: &[MediaListItem]) -> Result<Vec<CacheRequest>, Error> {
        let mut by_key: Vec<(String, Vec<CacheRequest>)> = Vec::new();
        for item in media_items {
            let request = self.fetcher.image_request(item.url.clone());
            let Some(item_key) = request.item_key().map(str::to_string) else { continue };
            match by_key.iter_mut().find(|(key, _)| *key == item_key) {
                Some((_, requests)) if requests.iter().any(|r| r.url == request.url) => {}
                Some((_, requests)) => requests.push(request),
                None => by_key.push((item_key, vec![request])),
            }
        }

        let mut images = Vec::new();
        for (item_key, requests) in by_key {
            let candidates: Vec<Option<String>> =
                requests.iter().map(|r| r.variant().map(str::to_string)).collect();
            let keep = self
                .db
                .select_candidate_variants(&item_key, &candidates, self.density)
                .await?;
            images.extend(
                requests
                    .into_iter()
                    .filter(|r| keep.iter().any(|v| v.as_deref() == r.variant())),
            );
        }
        Ok(images)
    }

    /// Batch URL inserts have no article form.
    pub async fn add_urls(&self, _urls: &[Url], group_key: &str) -> Result<Vec<CacheRequest>, Error> {
        Err(Error::InvalidInput(format!(
            "article groups are populated from one article URL, not a URL batch ({group_key})"
        )))
    }

    pub async fn all_downloaded(&self, group_key: &str) -> Result<bool, Error> {
        self.db.all_downloaded(group_key).await
    }

    /// Signal every in-flight fetch of the group to stop.
    pub fn cancel(&self, group_key: &str) -> usize {
        self.tracker.cancel_all(group_key)
    }

    /// Record only the content request of an article cached by an older
    /// release, grouped under the article's database key.
    pub async fn cache_from_migration(&self, article_url: &Url) -> Result<CacheRequest, Error> {
        let group_key = database_key(article_url)
            .ok_or_else(|| Error::MalformedRequest(format!("no database key for {article_url}")))?;
        let content = self.fetcher.content_request(article_url)?;

        self.db
            .commit_group(GroupBatch::new(group_key).must_have(content.item_spec()?))
            .await?;
        Ok(content)
    }

    /// Mark the item behind a migrated file as downloaded.
    pub async fn migrated_item_file(&self, request: &CacheRequest) -> Result<CacheItem, Error> {
        let spec = request.item_spec()?;
        self.db.mark_downloaded(&spec, request.etag()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ARTICLE, CSS, DOG_320, DOG_640, FakeFetcher, JS, Outcome, RecordingWriter, url};
    use satchel_core::ListKind;

    const GROUP: &str = "doc:Dog";

    struct Harness {
        db: CacheDb,
        files: Arc<RecordingWriter>,
        writer: Arc<ArticleCacheWriter<FakeFetcher>>,
    }

    async fn harness(fetcher: FakeFetcher) -> Harness {
        harness_at(fetcher, DensityClass::Two).await
    }

    async fn harness_at(fetcher: FakeFetcher, density: DensityClass) -> Harness {
        let db = CacheDb::open_in_memory().await.unwrap();
        let tracker = Arc::new(TaskTracker::new());
        let files = Arc::new(RecordingWriter::default());
        let images = ImageCacheWriter::new(db.clone(), files.clone(), Arc::clone(&tracker));
        let writer = ArticleCacheWriter::new(Arc::new(fetcher), db.clone(), tracker, images, density);
        Harness { db, files, writer: Arc::new(writer) }
    }

    #[tokio::test]
    async fn test_add_records_must_have_items() {
        let h = harness(FakeFetcher::dog()).await;

        let requests = h.writer.add(&url(ARTICLE), GROUP).await.unwrap();
        let urls: Vec<&str> = requests.iter().map(|r| r.url.as_str()).collect();
        assert_eq!(urls.len(), 5);
        assert_eq!(urls[0], "https://en.wikipedia.org/api/rest_v1/page/mobile-html/Dog");
        assert_eq!(urls[1], "https://en.wikipedia.org/api/rest_v1/page/media-list/Dog");
        assert_eq!(&urls[2..4], &[CSS, JS]);
        assert!(urls[4].starts_with("https://en.wikipedia.org/w/api.php?"));

        let must_have = h.db.must_have_items(GROUP).await.unwrap();
        assert_eq!(must_have.len(), 5);

        let written = h.files.wait_for(1).await;
        assert_eq!(written[0].url.as_str(), DOG_320);

        let status = h.db.group_status(GROUP).await.unwrap().unwrap();
        assert_eq!(status.items, 6);
        assert_eq!(status.must_have_items, 5);
    }

    #[tokio::test]
    async fn test_all_downloaded_after_every_must_have_item() {
        let h = harness(FakeFetcher::dog()).await;
        let requests = h.writer.add(&url(ARTICLE), GROUP).await.unwrap();

        for request in &requests {
            assert!(!h.writer.all_downloaded(GROUP).await.unwrap());
            h.writer.migrated_item_file(request).await.unwrap();
        }
        assert!(h.writer.all_downloaded(GROUP).await.unwrap());
    }

    fn dog_in_two_sizes() -> FakeFetcher {
        let mut fetcher = FakeFetcher::dog();
        fetcher.media = Outcome::Ready(vec![
            MediaListItem { title: "File:Dog.jpg".into(), url: url(DOG_320) },
            MediaListItem { title: "File:Dog.jpg".into(), url: url(DOG_640) },
        ]);
        fetcher
    }

    #[tokio::test]
    async fn test_duplicate_image_titles_get_one_info_request() {
        let h = harness(dog_in_two_sizes()).await;

        let requests = h.writer.add(&url(ARTICLE), GROUP).await.unwrap();
        let info = requests.iter().filter(|r| r.url.path() == "/w/api.php").count();
        assert_eq!(info, 1);
    }

    #[tokio::test]
    async fn test_one_image_variant_per_density() {
        for (density, expected) in [(DensityClass::One, DOG_320), (DensityClass::Two, DOG_640), (DensityClass::Three, DOG_640)] {
            let h = harness_at(dog_in_two_sizes(), density).await;
            h.writer.add(&url(ARTICLE), GROUP).await.unwrap();

            let written = h.files.wait_for(1).await;
            assert_eq!(written[0].url.as_str(), expected, "{density:?}");

            // images are recorded before any is written
            let status = h.db.group_status(GROUP).await.unwrap().unwrap();
            assert_eq!(status.items, 6, "{density:?}");
            assert_eq!(h.db.all_variant_items("upload.wikimedia.org/wikipedia/commons/a/ab/Dog.jpg").await.unwrap().len(), 1);
        }
    }

    #[tokio::test]
    async fn test_no_images_for_unknown_density() {
        let h = harness_at(dog_in_two_sizes(), DensityClass::Other).await;
        h.writer.add(&url(ARTICLE), GROUP).await.unwrap();

        let status = h.db.group_status(GROUP).await.unwrap().unwrap();
        assert_eq!(status.items, 5);
        assert!(h.files.written().is_empty());
    }

    #[tokio::test]
    async fn test_media_list_failure_persists_nothing() {
        let mut fetcher = FakeFetcher::dog();
        fetcher.media = Outcome::Fail;
        let h = harness(fetcher).await;

        let err = h.writer.add(&url(ARTICLE), GROUP).await.unwrap_err();
        assert!(matches!(err, Error::ListFetchFailed { kind: ListKind::MediaList, .. }));
        assert!(h.db.group(GROUP).await.unwrap().is_none());
        assert!(h.db.orphaned_items().await.unwrap().is_empty());
        assert!(h.files.written().is_empty());
    }

    #[tokio::test]
    async fn test_media_list_error_reported_before_offline_error() {
        let mut fetcher = FakeFetcher::dog();
        fetcher.media = Outcome::Fail;
        fetcher.offline = Outcome::Fail;
        let h = harness(fetcher).await;

        let err = h.writer.add(&url(ARTICLE), GROUP).await.unwrap_err();
        assert!(matches!(err, Error::ListFetchFailed { kind: ListKind::MediaList, .. }));
    }

    #[tokio::test]
    async fn test_offline_resource_failure() {
        let mut fetcher = FakeFetcher::dog();
        fetcher.offline = Outcome::Fail;
        let h = harness(fetcher).await;

        let err = h.writer.add(&url(ARTICLE), GROUP).await.unwrap_err();
        assert!(matches!(err, Error::ListFetchFailed { kind: ListKind::OfflineResources, .. }));
        assert!(h.db.group(GROUP).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_malformed_article_url() {
        let h = harness(FakeFetcher::dog()).await;
        let err = h.writer.add(&url("https://en.wikipedia.org/"), GROUP).await.unwrap_err();
        assert!(matches!(err, Error::MalformedRequest(_)));
        assert!(h.db.group(GROUP).await.unwrap().is_none());
        assert_eq!(h.writer.tracker().tracked_count(GROUP), 0);
    }

    #[tokio::test]
    async fn test_cancel_during_list_fetch() {
        let mut fetcher = FakeFetcher::dog();
        fetcher.media = Outcome::Hang;
        fetcher.offline = Outcome::Hang;
        let h = harness(fetcher).await;

        let pending = {
            let writer = Arc::clone(&h.writer);
            tokio::spawn(async move { writer.add(&url(ARTICLE), GROUP).await })
        };
        while h.writer.tracker().tracked_count(GROUP) < 2 {
            tokio::task::yield_now().await;
        }

        assert_eq!(h.writer.cancel(GROUP), 2);
        assert!(matches!(pending.await.unwrap(), Err(Error::Cancelled(_))));
        assert_eq!(h.writer.tracker().tracked_count(GROUP), 0);
        assert!(h.db.group(GROUP).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_add_urls_unsupported() {
        let h = harness(FakeFetcher::dog()).await;
        let err = h.writer.add_urls(&[url(ARTICLE)], GROUP).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_cache_from_migration() {
        let h = harness(FakeFetcher::dog()).await;
        let request = h.writer.cache_from_migration(&url(ARTICLE)).await.unwrap();

        let items = h.db.must_have_items("en.wikipedia.org/wiki/Dog").await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].url, request.url.as_str());
        assert!(!h.writer.all_downloaded("en.wikipedia.org/wiki/Dog").await.unwrap());

        h.writer.migrated_item_file(&request).await.unwrap();
        assert!(h.writer.all_downloaded("en.wikipedia.org/wiki/Dog").await.unwrap());
    }

    #[tokio::test]
    async fn test_migrated_item_file_requires_item_key() {
        let h = harness(FakeFetcher::dog()).await;
        let request = CacheRequest::new(url(ARTICLE));
        assert!(matches!(h.writer.migrated_item_file(&request).await, Err(Error::MissingHeader(_))));
    }
}
