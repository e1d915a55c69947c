//! In-flight fetches grouped by cache group.
//!
//! Every list or resource fetch started on behalf of a group is tracked under
//! a fresh untrack key so the whole group can be cancelled at once. Groups
//! live in a `DashMap`, so operations on different groups lock different
//! shards.

use std::future::Future;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::task::{AbortHandle, JoinHandle};
use uuid::Uuid;

use satchel_core::Error;

#[derive(Debug)]
struct IdentifiedTask {
    untrack_key: String,
    handle: AbortHandle,
}

/// Tracks cancellable tasks per group key.
#[derive(Debug, Default)]
pub struct TaskTracker {
    groups: DashMap<String, Vec<IdentifiedTask>>,
}

/// Untracks on drop, so every exit path of a tracked fetch cleans up.
struct UntrackGuard<'a> {
    tracker: &'a TaskTracker,
    untrack_key: String,
    group_key: &'a str,
}

impl Drop for UntrackGuard<'_> {
    fn drop(&mut self) {
        self.tracker.untrack(&self.untrack_key, self.group_key);
    }
}

impl TaskTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn track(&self, untrack_key: impl Into<String>, handle: AbortHandle, group_key: &str) {
        self.groups
            .entry(group_key.to_string())
            .or_default()
            .push(IdentifiedTask { untrack_key: untrack_key.into(), handle });
    }

    /// Remove one task. Unknown keys are ignored; empty groups are dropped.
    pub fn untrack(&self, untrack_key: &str, group_key: &str) {
        let now_empty = match self.groups.get_mut(group_key) {
            Some(mut tasks) => {
                tasks.retain(|task| task.untrack_key != untrack_key);
                tasks.is_empty()
            }
            None => return,
        };

        if now_empty {
            self.groups.remove_if(group_key, |_, tasks| tasks.is_empty());
        }
    }

    /// Request cancellation of every task tracked for the group.
    ///
    /// Does not wait for the tasks to stop. Returns how many were signalled.
    pub fn cancel_all(&self, group_key: &str) -> usize {
        match self.groups.get(group_key) {
            Some(tasks) => {
                for task in tasks.iter() {
                    task.handle.abort();
                }
                tracing::debug!(group_key, count = tasks.len(), "cancelled tracked tasks");
                tasks.len()
            }
            None => 0,
        }
    }

    pub fn tracked_count(&self, group_key: &str) -> usize {
        self.groups.get(group_key).map_or(0, |tasks| tasks.len())
    }

    /// Run `future` as a tracked task and wait for it.
    ///
    /// The task is untracked when it finishes, fails, or is cancelled. A
    /// cancelled task resolves to `Error::Cancelled`.
    pub async fn spawn_tracked<T, F>(&self, group_key: &str, future: F) -> Result<T, Error>
    where
        T: Send + 'static,
        F: Future<Output = Result<T, Error>> + Send + 'static,
    {
        let untrack_key = Uuid::new_v4().to_string();
        let handle = tokio::spawn(future);
        self.track(untrack_key.clone(), handle.abort_handle(), group_key);
        let _guard = UntrackGuard { tracker: self, untrack_key, group_key };

        match handle.await {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => Err(Error::Cancelled(group_key.to_string())),
            Err(e) => std::panic::resume_unwind(e.into_panic()),
        }
    }

    /// Start a tracked task without waiting for it.
    pub fn spawn_detached<F>(self: &Arc<Self>, group_key: &str, future: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let tracker = Arc::clone(self);
        let group_key = group_key.to_string();
        tokio::spawn(async move {
            let tracked = async move {
                future.await;
                Ok(())
            };
            if let Err(e) = tracker.spawn_tracked(&group_key, tracked).await {
                tracing::debug!(group_key, error = %e, "background task stopped");
            }
        })
    }
}
