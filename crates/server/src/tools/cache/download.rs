//! cache_download tool implementation.
//!
//! Downloads every item of a group that is not downloaded yet.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use satchel_core::Error;

use super::{FailedDownload, failed_downloads, json_result, require_group_key};
use crate::state::AppState;

/// Parameters for the cache_download tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheDownloadParams {
    pub group_key: String,
}

/// Output from the cache_download tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheDownloadOutput {
    pub group_key: String,
    pub requested: usize,
    pub written: usize,
    pub failed: Vec<FailedDownload>,
    pub all_downloaded: bool,
}

/// Implementation of the cache_download tool.
pub async fn download_impl(state: &AppState, params: CacheDownloadParams) -> Result<CallToolResult, McpError> {
    let group_key = require_group_key(&params.group_key)?;

    if state.controller.status(group_key).await?.is_none() {
        return Err(Error::CacheMiss(group_key.to_string()).into());
    }

    let summary = state.controller.download_group(group_key).await?;
    let all_downloaded = state.controller.all_downloaded(group_key).await?;

    json_result(&CacheDownloadOutput {
        group_key: group_key.to_string(),
        requested: summary.requested,
        written: summary.written,
        failed: failed_downloads(summary.failed),
        all_downloaded,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::test_support::{output, test_state};

    #[tokio::test]
    async fn test_download_missing_group() {
        let (_dir, state) = test_state().await;
        let err = download_impl(&state, CacheDownloadParams { group_key: "doc:Dog".into() })
            .await
            .unwrap_err();
        assert_eq!(err.code.0, -32001);
    }

    #[tokio::test]
    async fn test_download_complete_group_is_noop() {
        let (_dir, state) = test_state().await;
        let writer = state.controller.writer();
        let article = url::Url::parse("https://en.wikipedia.org/wiki/Dog").unwrap();
        let request = writer.cache_from_migration(&article).await.unwrap();
        writer.migrated_item_file(&request).await.unwrap();

        let params = CacheDownloadParams { group_key: "en.wikipedia.org/wiki/Dog".into() };
        let out: CacheDownloadOutput = output(&download_impl(&state, params).await.unwrap());
        assert_eq!(out.requested, 0);
        assert!(out.all_downloaded);
    }
}
