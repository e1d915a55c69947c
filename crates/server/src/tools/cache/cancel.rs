//! cache_cancel tool implementation.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::{json_result, require_group_key};
use crate::state::AppState;

/// Parameters for the cache_cancel tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheCancelParams {
    pub group_key: String,
}

/// Output from the cache_cancel tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheCancelOutput {
    /// Number of in-flight fetches signalled to stop.
    pub cancelled: usize,
}

/// Implementation of the cache_cancel tool.
pub async fn cancel_impl(state: &AppState, params: CacheCancelParams) -> Result<CallToolResult, McpError> {
    let group_key = require_group_key(&params.group_key)?;
    let cancelled = state.controller.cancel(group_key);
    json_result(&CacheCancelOutput { cancelled })
}
