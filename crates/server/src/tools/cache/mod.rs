//! Cache group MCP tools.
//!
//! This module provides tools for populating, inspecting and removing cache
//! groups, and for looking up cached responses.

use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use serde::Serialize;
use satchel_core::Error;

pub mod add;
pub mod cancel;
pub mod download;
pub mod lookup;
pub mod remove;
pub mod status;

pub use add::{CacheAddParams, add_impl};
pub use cancel::{CacheCancelParams, cancel_impl};
pub use download::{CacheDownloadParams, download_impl};
pub use lookup::{CacheLookupParams, lookup_impl};
pub use remove::{CacheRemoveParams, remove_impl};
pub use status::{CacheStatusParams, status_impl};

/// A failed download as reported to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, serde::Deserialize, schemars::JsonSchema)]
pub struct FailedDownload {
    pub url: String,
    pub error: String,
}

pub(crate) fn failed_downloads(failed: Vec<(String, String)>) -> Vec<FailedDownload> {
    failed.into_iter().map(|(url, error)| FailedDownload { url, error }).collect()
}

pub(crate) fn json_result<T: Serialize>(output: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(output)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize output: {e}")))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}

pub(crate) fn require_group_key(group_key: &str) -> Result<&str, Error> {
    let group_key = group_key.trim();
    if group_key.is_empty() {
        return Err(Error::InvalidInput("group_key must not be empty".to_string()));
    }
    Ok(group_key)
}
