//! Network collaborator used by the cache writers.
//!
//! [`ResourceFetcher`] builds the cacheable requests for an article and
//! fetches the two discovery lists (offline resources and media). The request
//! builders have default implementations for MediaWiki sites; implementors
//! only need to supply the fetches.

use async_trait::async_trait;
use serde::Deserialize;
use url::Url;

use satchel_core::{Error, ItemType, ListKind};

use crate::article::{ArticleUrl, image_info_url};
use crate::fetch::{FetchClient, FetchConfig, FetchResponse};
use crate::request::CacheRequest;

/// One image reference from an article's media list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaListItem {
    /// File title, e.g. `File:Dog.jpg`
    pub title: String,
    pub url: Url,
}

#[async_trait]
pub trait ResourceFetcher: Send + Sync + 'static {
    /// Request for the article's primary content.
    fn content_request(&self, article_url: &Url) -> Result<CacheRequest, Error> {
        let article = ArticleUrl::parse(article_url)?;
        Ok(CacheRequest::cacheable(article.content_url()?, ItemType::Article))
    }

    fn offline_resources_request(&self, article_url: &Url) -> Result<CacheRequest, Error> {
        let article = ArticleUrl::parse(article_url)?;
        Ok(CacheRequest::cacheable(article.offline_resources_url()?, ItemType::Article))
    }

    fn media_list_request(&self, article_url: &Url) -> Result<CacheRequest, Error> {
        let article = ArticleUrl::parse(article_url)?;
        Ok(CacheRequest::cacheable(article.media_list_url()?, ItemType::Article))
    }

    /// Metadata request for one image title, on the article's site.
    fn image_info_request(&self, image_title: &str, article_url: &Url) -> Option<CacheRequest> {
        let article = ArticleUrl::parse(article_url).ok()?;
        let url = image_info_url(article.site(), image_title)?;
        Some(CacheRequest::cacheable(url, ItemType::Article))
    }

    /// Request for a stylesheet or script listed as an offline resource.
    fn resource_request(&self, url: Url) -> CacheRequest {
        CacheRequest::cacheable(url, ItemType::Article)
    }

    fn image_request(&self, url: Url) -> CacheRequest {
        CacheRequest::cacheable(url, ItemType::Image)
    }

    /// Fetch the list of resources the content needs offline.
    ///
    /// # Errors
    ///
    /// Any failure is `Error::ListFetchFailed` with `ListKind::OfflineResources`.
    async fn fetch_offline_resources(&self, request: &CacheRequest) -> Result<Vec<Url>, Error>;

    /// Fetch the media list, flattened to one entry per image source.
    ///
    /// # Errors
    ///
    /// Any failure is `Error::ListFetchFailed` with `ListKind::MediaList`.
    async fn fetch_media_list(&self, request: &CacheRequest) -> Result<Vec<MediaListItem>, Error>;

    async fn fetch_bytes(&self, request: &CacheRequest) -> Result<FetchResponse, Error>;
}

#[derive(Debug, Deserialize)]
struct MediaListPayload {
    #[serde(default)]
    items: Vec<MediaPayloadItem>,
}

#[derive(Debug, Deserialize)]
struct MediaPayloadItem {
    #[serde(default)]
    title: Option<String>,
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    srcset: Vec<MediaSource>,
}

#[derive(Debug, Deserialize)]
struct MediaSource {
    src: String,
}

fn list_error(kind: ListKind) -> impl Fn(Error) -> Error {
    move |e| match e {
        e @ Error::ListFetchFailed { .. } => e,
        e => Error::ListFetchFailed { kind, reason: e.to_string() },
    }
}

/// Resolve list entries (often protocol-relative) against the list URL.
fn resolve(base: &Url, reference: &str) -> Option<Url> {
    match base.join(reference) {
        Ok(url) => Some(url),
        Err(e) => {
            tracing::warn!(reference, error = %e, "skipping unresolvable list entry");
            None
        }
    }
}

/// Parse an offline resources payload: a JSON array of URL strings.
pub fn parse_offline_resources(base: &Url, body: &[u8]) -> Result<Vec<Url>, Error> {
    let entries: Vec<String> = serde_json::from_slice(body)
        .map_err(|e| Error::ListFetchFailed { kind: ListKind::OfflineResources, reason: e.to_string() })?;
    Ok(entries.iter().filter_map(|entry| resolve(base, entry)).collect())
}

/// Parse a media list payload, keeping image items that have sources.
pub fn parse_media_list(base: &Url, body: &[u8]) -> Result<Vec<MediaListItem>, Error> {
    let payload: MediaListPayload = serde_json::from_slice(body)
        .map_err(|e| Error::ListFetchFailed { kind: ListKind::MediaList, reason: e.to_string() })?;

    let mut items = Vec::new();
    for item in payload.items {
        if item.kind.as_deref() != Some("image") {
            continue;
        }
        let Some(title) = item.title else { continue };
        for source in &item.srcset {
            if let Some(url) = resolve(base, &source.src) {
                items.push(MediaListItem { title: title.clone(), url });
            }
        }
    }
    Ok(items)
}

/// [`ResourceFetcher`] for MediaWiki sites over HTTP.
#[derive(Debug, Clone)]
pub struct WikiFetcher {
    client: FetchClient,
}

impl WikiFetcher {
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        Ok(Self { client: FetchClient::new(config)? })
    }

    pub fn client(&self) -> &FetchClient {
        &self.client
    }
}

#[async_trait]
impl ResourceFetcher for WikiFetcher {
    async fn fetch_offline_resources(&self, request: &CacheRequest) -> Result<Vec<Url>, Error> {
        let response = self
            .client
            .fetch(request)
            .await
            .map_err(list_error(ListKind::OfflineResources))?;
        parse_offline_resources(&response.final_url, &response.bytes)
    }

    async fn fetch_media_list(&self, request: &CacheRequest) -> Result<Vec<MediaListItem>, Error> {
        let response = self
            .client
            .fetch(request)
            .await
            .map_err(list_error(ListKind::MediaList))?;
        parse_media_list(&response.final_url, &response.bytes)
    }

    async fn fetch_bytes(&self, request: &CacheRequest) -> Result<FetchResponse, Error> {
        self.client.fetch(request).await
    }
}
