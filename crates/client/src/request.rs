//! Cacheable requests.
//!
//! A [`CacheRequest`] is a URL plus the header fields of the persistent cache
//! metadata contract. Request builders attach the fields; the orchestrator
//! and lookup adapter read them back.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use satchel_core::headers::{self, ETAG, ITEM_KEY, ITEM_TYPE, ITEM_VARIANT, ItemType};
use satchel_core::{CacheItem, Error, ItemSpec};
use url::Url;

/// A request that may be served from, or written to, the persistent cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheRequest {
    pub url: Url,
    pub headers: HeaderMap,
}

impl CacheRequest {
    /// A request without cache metadata.
    pub fn new(url: Url) -> Self {
        Self { url, headers: HeaderMap::new() }
    }

    /// A request carrying the metadata generated for `item_type`.
    ///
    /// URLs without a derivable item key get no metadata and are therefore
    /// not cacheable.
    pub fn cacheable(url: Url, item_type: ItemType) -> Self {
        let mut request = Self::new(url);
        for (name, value) in headers::header_fields(&request.url, item_type) {
            if let Err(e) = request.set_header(name, &value) {
                tracing::warn!(url = %request.url, header = name, error = %e, "skipping cache metadata");
            }
        }
        request
    }

    /// Rebuild the request that produced a stored item.
    pub fn for_item(item: &CacheItem) -> Result<Self, Error> {
        let url = Url::parse(&item.url).map_err(|e| Error::InvalidUrl(format!("{}: {e}", item.url)))?;
        let mut request = Self::new(url);
        request.set_header(ITEM_KEY, &item.item_key)?;
        if let Some(variant) = &item.variant {
            request.set_header(ITEM_VARIANT, variant)?;
        }
        request.set_header(ITEM_TYPE, item.item_type.as_str())?;
        if let Some(etag) = &item.etag {
            request.set_header(ETAG, etag)?;
        }
        Ok(request)
    }

    pub fn set_header(&mut self, name: &str, value: &str) -> Result<(), Error> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| Error::MalformedRequest(format!("header name {name}: {e}")))?;
        let value =
            HeaderValue::from_str(value).map_err(|e| Error::MalformedRequest(format!("header {name}: {e}")))?;
        self.headers.insert(name, value);
        Ok(())
    }

    fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn item_key(&self) -> Option<&str> {
        self.header(ITEM_KEY)
    }

    pub fn variant(&self) -> Option<&str> {
        self.header(ITEM_VARIANT).filter(|v| !v.is_empty())
    }

    pub fn item_type(&self) -> ItemType {
        ItemType::from_header(self.header(ITEM_TYPE))
    }

    pub fn etag(&self) -> Option<&str> {
        self.header(ETAG)
    }

    /// Persistence identity of this request.
    ///
    /// # Errors
    ///
    /// Returns `Error::MissingHeader` if the item key is absent.
    pub fn item_spec(&self) -> Result<ItemSpec, Error> {
        let item_key = self.item_key().ok_or(Error::MissingHeader(ITEM_KEY))?;
        Ok(ItemSpec::new(self.url.as_str(), item_key, self.variant().map(str::to_string)).with_type(self.item_type()))
    }

    /// Headers to put on the wire: everything except the cache metadata.
    pub fn wire_headers(&self) -> HeaderMap {
        let mut wire = self.headers.clone();
        for name in [ITEM_KEY, ITEM_VARIANT, ITEM_TYPE, ETAG] {
            wire.remove(name);
        }
        if let Some(etag) = self.etag()
            && let Ok(value) = HeaderValue::from_str(etag)
        {
            wire.insert(reqwest::header::IF_NONE_MATCH, value);
        }
        wire
    }
}
