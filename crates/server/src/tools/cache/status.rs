//! cache_status tool implementation.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::{json_result, require_group_key};
use crate::state::AppState;

/// Parameters for the cache_status tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheStatusParams {
    pub group_key: String,
}

/// Output from the cache_status tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheStatusOutput {
    pub group_key: String,
    pub exists: bool,
    pub all_downloaded: bool,
    pub items: u64,
    pub downloaded_items: u64,
    pub must_have_items: u64,
    pub downloaded_must_have_items: u64,
}

/// Implementation of the cache_status tool.
pub async fn status_impl(state: &AppState, params: CacheStatusParams) -> Result<CallToolResult, McpError> {
    let group_key = require_group_key(&params.group_key)?;

    let output = match state.controller.status(group_key).await? {
        Some(status) => CacheStatusOutput {
            exists: true,
            all_downloaded: status.all_downloaded(),
            group_key: status.group_key,
            items: status.items,
            downloaded_items: status.downloaded_items,
            must_have_items: status.must_have_items,
            downloaded_must_have_items: status.downloaded_must_have_items,
        },
        None => CacheStatusOutput {
            group_key: group_key.to_string(),
            exists: false,
            all_downloaded: false,
            items: 0,
            downloaded_items: 0,
            must_have_items: 0,
            downloaded_must_have_items: 0,
        },
    };

    json_result(&output)
}
