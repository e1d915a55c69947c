//! cache_add tool implementation.
//!
//! Records an article group and downloads its must-have items.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use url::Url;

use satchel_core::Error;
use satchel_core::keys::database_key;

use super::{FailedDownload, failed_downloads, json_result};
use crate::state::AppState;

/// Parameters for the cache_add tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheAddParams {
    /// Article URL, e.g. `https://en.wikipedia.org/wiki/Dog`.
    pub url: String,

    /// Group to record the article under. Defaults to the URL's host and path.
    pub group_key: Option<String>,
}

/// Output from the cache_add tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheAddOutput {
    pub group_key: String,
    /// Number of must-have items recorded.
    pub requested: usize,
    pub written: usize,
    pub failed: Vec<FailedDownload>,
    pub all_downloaded: bool,
}

/// Implementation of the cache_add tool.
pub async fn add_impl(state: &AppState, params: CacheAddParams) -> Result<CallToolResult, McpError> {
    let url = Url::parse(&params.url).map_err(|e| Error::InvalidUrl(format!("{}: {e}", params.url)))?;

    let group_key = match params.group_key {
        Some(key) => super::require_group_key(&key)?.to_string(),
        None => database_key(&url).ok_or_else(|| Error::InvalidUrl(format!("no group key for {url}")))?,
    };

    let summary = state.controller.add(&url, &group_key).await?;
    let all_downloaded = state.controller.all_downloaded(&group_key).await?;

    json_result(&CacheAddOutput {
        group_key,
        requested: summary.requested,
        written: summary.written,
        failed: failed_downloads(summary.failed),
        all_downloaded,
    })
}
