//! cache_lookup tool implementation.
//!
//! Looks a URL up the way a cached fetch would: in memory first, then the
//! persistent store with variant fallback.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use url::Url;

use satchel_client::CacheRequest;
use satchel_core::{Error, ItemType};

use super::json_result;
use crate::state::AppState;

/// Parameters for the cache_lookup tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheLookupParams {
    pub url: String,

    /// How the URL is keyed. Defaults to `Article`.
    #[serde(default)]
    pub item_type: ItemType,
}

/// Output from the cache_lookup tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheLookupOutput {
    pub hit: bool,
    pub status: Option<u16>,
    pub content_type: Option<String>,
    pub etag: Option<String>,
    /// Body size in bytes.
    pub size: Option<usize>,
}

/// Implementation of the cache_lookup tool.
pub async fn lookup_impl(state: &AppState, params: CacheLookupParams) -> Result<CallToolResult, McpError> {
    let url = Url::parse(&params.url).map_err(|e| Error::InvalidUrl(format!("{}: {e}", params.url)))?;
    let request = CacheRequest::cacheable(url, params.item_type);

    let output = match state.lookup.cached_response(&request).await {
        Some(response) => CacheLookupOutput {
            hit: true,
            status: Some(response.status),
            content_type: response.content_type().map(str::to_string),
            etag: response.etag().map(str::to_string),
            size: Some(response.body.len()),
        },
        None => CacheLookupOutput { hit: false, status: None, content_type: None, etag: None, size: None },
    };

    json_result(&output)
}
