//! Client side of satchel.
//!
//! This crate provides the network fetcher, the grouped task tracker, the
//! writers that populate cache groups, and the lookup adapter that serves
//! cached responses.

pub mod article;
pub mod controller;
pub mod fetch;
pub mod fetcher;
pub mod file_writer;
pub mod lookup;
pub mod request;
pub mod tracker;
pub mod writer;

#[cfg(test)]
mod testing;

pub use controller::{CacheController, DownloadSummary};
pub use fetch::{FetchClient, FetchConfig, FetchResponse};
pub use fetcher::{MediaListItem, ResourceFetcher, WikiFetcher};
pub use file_writer::{CacheFileWriter, FileWriter};
pub use lookup::{MemoryCache, PendingFetch, PersistentUrlCache, VolatileCache};
pub use request::CacheRequest;
pub use tracker::TaskTracker;
pub use writer::{ArticleCacheWriter, ImageCacheWriter};
