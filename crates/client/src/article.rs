//! Article URL parsing and MediaWiki endpoint construction.
//!
//! Article URLs have the form `http(s)://<host>/wiki/<Title>`. The title is
//! kept percent-encoded exactly as it appears in the URL path, except that a
//! `/` inside the title is encoded so it survives as one REST path segment.

use satchel_core::Error;
use url::Url;

const REST_PAGE_PATH: &str = "/api/rest_v1/page";

/// A parsed article URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleUrl {
    site: Url,
    title: String,
}

impl ArticleUrl {
    /// Parse an article URL.
    ///
    /// # Errors
    ///
    /// Returns `Error::MalformedRequest` for non-HTTP schemes, missing hosts
    /// and paths that are not `/wiki/<Title>`.
    pub fn parse(url: &Url) -> Result<Self, Error> {
        match url.scheme() {
            "http" | "https" => {}
            scheme => return Err(Error::MalformedRequest(format!("unsupported scheme: {scheme}"))),
        }

        let host = url
            .host_str()
            .ok_or_else(|| Error::MalformedRequest(format!("missing host: {url}")))?
            .to_lowercase();

        let title = url
            .path()
            .strip_prefix("/wiki/")
            .filter(|t| !t.is_empty())
            .ok_or_else(|| Error::MalformedRequest(format!("not an article path: {}", url.path())))?
            .replace('/', "%2F");

        let authority = match url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host,
        };
        let site = Url::parse(&format!("{}://{authority}/", url.scheme()))
            .map_err(|e| Error::MalformedRequest(e.to_string()))?;

        Ok(Self { site, title })
    }

    pub fn site(&self) -> &Url {
        &self.site
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    fn rest_endpoint(&self, endpoint: &str) -> Result<Url, Error> {
        self.site
            .join(&format!("{REST_PAGE_PATH}/{endpoint}/{}", self.title))
            .map_err(|e| Error::MalformedRequest(e.to_string()))
    }

    /// Primary content (`mobile-html`).
    pub fn content_url(&self) -> Result<Url, Error> {
        self.rest_endpoint("mobile-html")
    }

    /// List of stylesheets and scripts the content needs offline.
    pub fn offline_resources_url(&self) -> Result<Url, Error> {
        self.rest_endpoint("mobile-html-offline-resources")
    }

    /// List of media referenced by the content.
    pub fn media_list_url(&self) -> Result<Url, Error> {
        self.rest_endpoint("media-list")
    }
}

/// Image metadata lookup (captions, licensing) for one file title.
pub fn image_info_url(site: &Url, image_title: &str) -> Option<Url> {
    if image_title.trim().is_empty() {
        return None;
    }

    let mut url = site.join("/w/api.php").ok()?;
    url.query_pairs_mut()
        .append_pair("action", "query")
        .append_pair("format", "json")
        .append_pair("formatversion", "2")
        .append_pair("prop", "imageinfo")
        .append_pair("iiprop", "url|size|mime|extmetadata")
        .append_pair("iiurlwidth", "640")
        .append_pair("titles", image_title);
    Some(url)
}
