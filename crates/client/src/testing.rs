//! Test doubles for the network side of the cache writers.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{StatusCode, header};
use url::Url;

use satchel_core::{Error, ListKind};

use crate::fetch::FetchResponse;
use crate::fetcher::{MediaListItem, ResourceFetcher};
use crate::file_writer::FileWriter;
use crate::request::CacheRequest;

pub const ARTICLE: &str = "https://en.wikipedia.org/wiki/Dog";
pub const CSS: &str = "https://meta.wikimedia.org/api/rest_v1/data/css/mobile/site";
pub const JS: &str = "https://meta.wikimedia.org/api/rest_v1/data/javascript/mobile/pcs";
pub const DOG_320: &str = "https://upload.wikimedia.org/wikipedia/commons/thumb/a/ab/Dog.jpg/320px-Dog.jpg";
pub const DOG_640: &str = "https://upload.wikimedia.org/wikipedia/commons/thumb/a/ab/Dog.jpg/640px-Dog.jpg";

pub fn url(s: &str) -> Url {
    Url::parse(s).unwrap()
}

/// How a fake list fetch behaves.
#[derive(Debug, Clone)]
pub enum Outcome<T> {
    Ready(T),
    Fail,
    /// Never completes; only cancellation ends it.
    Hang,
}

impl<T> Outcome<T> {
    async fn resolve(&self, kind: ListKind) -> Result<T, Error>
    where
        T: Clone,
    {
        match self {
            Outcome::Ready(value) => Ok(value.clone()),
            Outcome::Fail => Err(Error::ListFetchFailed { kind, reason: "status 500".into() }),
            Outcome::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(Error::ListFetchFailed { kind, reason: "timed out".into() })
            }
        }
    }
}

#[derive(Debug)]
pub struct FakeFetcher {
    pub offline: Outcome<Vec<Url>>,
    pub media: Outcome<Vec<MediaListItem>>,
    /// Bodies served by `fetch_bytes`, keyed by URL.
    pub bodies: HashMap<String, &'static str>,
    pub fetched: Mutex<Vec<String>>,
}

impl FakeFetcher {
    /// The Dog article: two offline resources and one image.
    pub fn dog() -> Self {
        Self {
            offline: Outcome::Ready(vec![url(CSS), url(JS)]),
            media: Outcome::Ready(vec![MediaListItem { title: "File:Dog.jpg".into(), url: url(DOG_320) }]),
            bodies: HashMap::new(),
            fetched: Mutex::new(Vec::new()),
        }
    }

    pub fn with_body(mut self, url: &str, body: &'static str) -> Self {
        self.bodies.insert(url.to_string(), body);
        self
    }

    pub fn fetched(&self) -> Vec<String> {
        self.fetched.lock().unwrap().clone()
    }
}

#[async_trait]
impl ResourceFetcher for FakeFetcher {
    async fn fetch_offline_resources(&self, _request: &CacheRequest) -> Result<Vec<Url>, Error> {
        self.offline.resolve(ListKind::OfflineResources).await
    }

    async fn fetch_media_list(&self, _request: &CacheRequest) -> Result<Vec<MediaListItem>, Error> {
        self.media.resolve(ListKind::MediaList).await
    }

    async fn fetch_bytes(&self, request: &CacheRequest) -> Result<FetchResponse, Error> {
        self.fetched.lock().unwrap().push(request.url.to_string());
        let body = self
            .bodies
            .get(request.url.as_str())
            .ok_or_else(|| Error::HttpError(format!("status 404 for {}", request.url)))?;

        let mut headers = header::HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, header::HeaderValue::from_static("text/html"));
        headers.insert(header::ETAG, header::HeaderValue::from_static("\"fake\""));

        Ok(FetchResponse {
            url: request.url.clone(),
            final_url: request.url.clone(),
            status: StatusCode::OK,
            content_type: Some("text/html".into()),
            bytes: Bytes::from_static(body.as_bytes()),
            headers,
            fetch_ms: 0,
        })
    }
}

/// File writer that only records what it was asked to write.
#[derive(Debug, Default)]
pub struct RecordingWriter {
    written: Mutex<Vec<CacheRequest>>,
}

impl RecordingWriter {
    pub fn written(&self) -> Vec<CacheRequest> {
        self.written.lock().unwrap().clone()
    }

    /// Wait until at least `count` writes were recorded.
    pub async fn wait_for(&self, count: usize) -> Vec<CacheRequest> {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let written = self.written();
                if written.len() >= count {
                    return written;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap()
    }
}

#[async_trait]
impl FileWriter for RecordingWriter {
    async fn write(&self, request: &CacheRequest) -> Result<(), Error> {
        self.written.lock().unwrap().push(request.clone());
        Ok(())
    }
}
