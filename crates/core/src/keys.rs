//! Cache key generation.
//!
//! Item keys are derived from resource URLs. Each item type has its own
//! generator so that keys stay collision-free within a type namespace, and
//! the file names used by the response store are content-addressed hashes of
//! `(item_key, variant)`.

use std::sync::LazyLock;

use regex::Regex;
use sha2::{Digest, Sha256};
use url::Url;

use crate::headers::ItemType;

/// `/<prefix>/thumb/<a>/<ab>/<File>/<N>px-<File>`
static THUMBNAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<prefix>.*)/thumb/(?P<path>[0-9a-f]/[0-9a-f]{2}/[^/]+)/(?P<size>\d+)px-[^/]+$")
        .expect("thumbnail pattern is valid")
});

/// Strategy for turning a URL into a persistent cache identity.
pub trait CacheKeyGenerator: Send + Sync {
    /// Stable identity of the logical resource behind `url`.
    fn item_key(&self, url: &Url) -> Option<String>;

    /// Fidelity discriminator for `url`, if the type has variants.
    fn variant(&self, url: &Url) -> Option<String>;

    /// File name of the stored response body.
    fn unique_file_name(&self, item_key: &str, variant: Option<&str>) -> String {
        compute_file_key(item_key, variant)
    }

    /// File name of the stored response headers.
    fn unique_header_file_name(&self, item_key: &str, variant: Option<&str>) -> String {
        format!("{}.headers", self.unique_file_name(item_key, variant))
    }
}

/// Keys for primary content (documents, lists, metadata lookups).
#[derive(Debug, Clone, Copy, Default)]
pub struct ArticleKeyGenerator;

/// Keys for images, with the thumbnail width as the variant.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageKeyGenerator;

impl CacheKeyGenerator for ArticleKeyGenerator {
    fn item_key(&self, url: &Url) -> Option<String> {
        let host = url.host_str()?.to_lowercase();
        match url.query() {
            Some(query) => Some(format!("{host}{}?{query}", url.path())),
            None => Some(format!("{host}{}", url.path())),
        }
    }

    fn variant(&self, _url: &Url) -> Option<String> {
        None
    }
}

impl CacheKeyGenerator for ImageKeyGenerator {
    fn item_key(&self, url: &Url) -> Option<String> {
        let host = url.host_str()?.to_lowercase();
        let path = url.path();
        match THUMBNAIL.captures(path) {
            Some(caps) => Some(format!("{host}{}/{}", &caps["prefix"], &caps["path"])),
            None => Some(format!("{host}{path}")),
        }
    }

    fn variant(&self, url: &Url) -> Option<String> {
        THUMBNAIL.captures(url.path()).map(|caps| caps["size"].to_string())
    }
}

/// Generator for the given item type.
pub fn generator_for(item_type: ItemType) -> &'static dyn CacheKeyGenerator {
    match item_type {
        ItemType::Image => &ImageKeyGenerator,
        ItemType::Article => &ArticleKeyGenerator,
    }
}

/// Group key for a top-level article URL (host + path).
pub fn database_key(url: &Url) -> Option<String> {
    let host = url.host_str()?.to_lowercase();
    let path = url.path();
    if path.is_empty() || path == "/" {
        return None;
    }
    Some(format!("{host}{path}"))
}

/// Content-addressed name for an `(item_key, variant)` pair.
pub fn compute_file_key(item_key: &str, variant: Option<&str>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(item_key.as_bytes());
    hasher.update(b"\n");
    hasher.update(variant.unwrap_or("").as_bytes());
    hex::encode(hasher.finalize())
}
