//! cache_remove tool implementation.
//!
//! Removes a group and every item no other group still uses.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::{json_result, require_group_key};
use crate::state::AppState;

/// Parameters for the cache_remove tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheRemoveParams {
    pub group_key: String,
}

/// Output from the cache_remove tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheRemoveOutput {
    /// Number of items deleted along with their stored responses.
    pub deleted: u64,
}

/// Implementation of the cache_remove tool.
pub async fn remove_impl(state: &AppState, params: CacheRemoveParams) -> Result<CallToolResult, McpError> {
    let group_key = require_group_key(&params.group_key)?;
    let deleted = state.controller.remove(group_key).await?;
    json_result(&CacheRemoveOutput { deleted })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::test_support::{output, test_state};

    #[tokio::test]
    async fn test_remove_group() {
        let (_dir, state) = test_state().await;
        let article = url::Url::parse("https://en.wikipedia.org/wiki/Dog").unwrap();
        state.controller.writer().cache_from_migration(&article).await.unwrap();

        let params = CacheRemoveParams { group_key: "en.wikipedia.org/wiki/Dog".into() };
        let out: CacheRemoveOutput = output(&remove_impl(&state, params.clone()).await.unwrap());
        assert_eq!(out.deleted, 1);

        let out: CacheRemoveOutput = output(&remove_impl(&state, params).await.unwrap());
        assert_eq!(out.deleted, 0);
    }
}
