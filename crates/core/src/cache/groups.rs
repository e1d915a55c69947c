//! Cache group operations.
//!
//! A group collects every item one logical content item needs. Membership
//! lives in `cache_group_items`; the `must_have` flag on a membership row
//! marks the subset that gates "fully downloaded", so must-have items are
//! always a subset of the group's items.

use super::connection::CacheDb;
use super::items::{CacheItem, ITEM_COLUMNS, ItemSpec, fetch_or_create_item_in, item_from_row};
use crate::Error;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite::{self, Connection};

/// A persisted cache group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct CacheGroup {
    pub id: i64,
    pub group_key: String,
    pub created_at: String,
}

/// An item together with its membership flag in one group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupItem {
    pub item: CacheItem,
    pub must_have: bool,
}

/// Download progress of a group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct GroupStatus {
    pub group_key: String,
    pub items: u64,
    pub downloaded_items: u64,
    pub must_have_items: u64,
    pub downloaded_must_have_items: u64,
}

impl GroupStatus {
    /// True when the group has items and every must-have item is downloaded.
    pub fn all_downloaded(&self) -> bool {
        self.items > 0 && self.downloaded_must_have_items == self.must_have_items
    }
}

/// One all-or-nothing write to a group.
///
/// Must-have items join the group and its must-have subset; nice-to-have
/// items only join the group. An item already marked must-have in this group
/// stays must-have when it is added again as nice-to-have.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupBatch {
    pub group_key: String,
    pub must_have: Vec<ItemSpec>,
    pub nice_to_have: Vec<ItemSpec>,
}

impl GroupBatch {
    pub fn new(group_key: impl Into<String>) -> Self {
        Self { group_key: group_key.into(), ..Default::default() }
    }

    pub fn must_have(mut self, spec: ItemSpec) -> Self {
        self.must_have.push(spec);
        self
    }

    pub fn nice_to_have(mut self, spec: ItemSpec) -> Self {
        self.nice_to_have.push(spec);
        self
    }
}

fn find_group(conn: &Connection, group_key: &str) -> Result<Option<CacheGroup>, Error> {
    let mut stmt = conn.prepare("SELECT id, group_key, created_at FROM cache_groups WHERE group_key = ?1")?;
    let result = stmt.query_row(params![group_key], |row| {
        Ok(CacheGroup { id: row.get(0)?, group_key: row.get(1)?, created_at: row.get(2)? })
    });

    match result {
        Ok(group) => Ok(Some(group)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn fetch_or_create_group_in(conn: &Connection, group_key: &str) -> Result<CacheGroup, Error> {
    if let Some(group) = find_group(conn, group_key)? {
        return Ok(group);
    }

    conn.execute(
        "INSERT INTO cache_groups (group_key, created_at) VALUES (?1, ?2)",
        params![group_key, chrono::Utc::now().to_rfc3339()],
    )?;

    find_group(conn, group_key)?.ok_or_else(|| Error::Unresolvable(format!("group {group_key}")))
}

fn link_item(conn: &Connection, group_id: i64, item_id: i64, must_have: bool) -> Result<(), Error> {
    conn.execute(
        "INSERT INTO cache_group_items (group_id, item_id, must_have) VALUES (?1, ?2, ?3)
         ON CONFLICT(group_id, item_id) DO UPDATE SET must_have = MAX(must_have, excluded.must_have)",
        params![group_id, item_id, must_have as i32],
    )?;
    Ok(())
}

impl CacheDb {
    /// Fetch a group by key, creating it if missing.
    pub async fn fetch_or_create_group(&self, group_key: &str) -> Result<CacheGroup, Error> {
        let group_key = group_key.to_string();
        self.conn
            .call(move |conn| -> Result<CacheGroup, Error> { fetch_or_create_group_in(conn, &group_key) })
            .await
            .map_err(Error::from)
    }

    /// Get a group by key.
    pub async fn group(&self, group_key: &str) -> Result<Option<CacheGroup>, Error> {
        let group_key = group_key.to_string();
        self.conn
            .call(move |conn| -> Result<Option<CacheGroup>, Error> { find_group(conn, &group_key) })
            .await
            .map_err(Error::from)
    }

    /// Apply a [`GroupBatch`] in a single transaction.
    ///
    /// Creates the group lazily, fetch-or-creates every item and links it.
    /// On any failure nothing from the batch is visible.
    pub async fn commit_group(&self, batch: GroupBatch) -> Result<CacheGroup, Error> {
        self.conn
            .call(move |conn| -> Result<CacheGroup, Error> {
                let tx = conn.transaction()?;
                let group = fetch_or_create_group_in(&tx, &batch.group_key)?;

                for spec in &batch.must_have {
                    let item = fetch_or_create_item_in(&tx, spec)?;
                    link_item(&tx, group.id, item.id, true)?;
                }
                for spec in &batch.nice_to_have {
                    let item = fetch_or_create_item_in(&tx, spec)?;
                    link_item(&tx, group.id, item.id, false)?;
                }

                tx.commit()?;
                tracing::info!(
                    group_key = %batch.group_key,
                    must_have = batch.must_have.len(),
                    nice_to_have = batch.nice_to_have.len(),
                    "committed cache group"
                );
                Ok(group)
            })
            .await
            .map_err(Error::from)
    }

    /// Every item of a group with its must-have flag.
    pub async fn group_items(&self, group_key: &str) -> Result<Vec<GroupItem>, Error> {
        let group_key = group_key.to_string();
        self.conn
            .call(move |conn| -> Result<Vec<GroupItem>, Error> {
                let columns = ITEM_COLUMNS
                    .split(", ")
                    .map(|c| format!("i.{c}"))
                    .collect::<Vec<_>>()
                    .join(", ");
                let mut stmt = conn.prepare(&format!(
                    "SELECT {columns}, gi.must_have FROM cache_groups g
                     JOIN cache_group_items gi ON gi.group_id = g.id
                     JOIN cache_items i ON i.id = gi.item_id
                     WHERE g.group_key = ?1
                     ORDER BY i.id ASC"
                ))?;
                let items = stmt
                    .query_map(params![group_key], |row| {
                        Ok(GroupItem { item: item_from_row(row)?, must_have: row.get::<_, i32>(9)? == 1 })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(items)
            })
            .await
            .map_err(Error::from)
    }

    /// The must-have subset of a group.
    pub async fn must_have_items(&self, group_key: &str) -> Result<Vec<CacheItem>, Error> {
        Ok(self
            .group_items(group_key)
            .await?
            .into_iter()
            .filter(|gi| gi.must_have)
            .map(|gi| gi.item)
            .collect())
    }

    /// Download counts for a group, or None if the group doesn't exist.
    pub async fn group_status(&self, group_key: &str) -> Result<Option<GroupStatus>, Error> {
        let group_key = group_key.to_string();
        self.conn
            .call(move |conn| -> Result<Option<GroupStatus>, Error> {
                let Some(group) = find_group(conn, &group_key)? else {
                    return Ok(None);
                };

                let status = conn.query_row(
                    "SELECT
                        COUNT(*),
                        COALESCE(SUM(i.is_downloaded), 0),
                        COALESCE(SUM(gi.must_have), 0),
                        COALESCE(SUM(gi.must_have * i.is_downloaded), 0)
                     FROM cache_group_items gi
                     JOIN cache_items i ON i.id = gi.item_id
                     WHERE gi.group_id = ?1",
                    params![group.id],
                    |row| {
                        Ok(GroupStatus {
                            group_key: group.group_key.clone(),
                            items: row.get::<_, i64>(0)? as u64,
                            downloaded_items: row.get::<_, i64>(1)? as u64,
                            must_have_items: row.get::<_, i64>(2)? as u64,
                            downloaded_must_have_items: row.get::<_, i64>(3)? as u64,
                        })
                    },
                )?;
                Ok(Some(status))
            })
            .await
            .map_err(Error::from)
    }

    /// Whether every must-have item of the group is downloaded.
    ///
    /// A missing group, or a group without items, is not downloaded.
    pub async fn all_downloaded(&self, group_key: &str) -> Result<bool, Error> {
        Ok(self
            .group_status(group_key)
            .await?
            .is_some_and(|status| status.all_downloaded()))
    }

    /// Delete a group, its memberships and every item no other group still
    /// references, in one transaction.
    ///
    /// Returns the deleted items so their stored files can be removed, or
    /// `None` when there was no such group.
    pub async fn remove_group(&self, group_key: &str) -> Result<Option<Vec<CacheItem>>, Error> {
        let group_key = group_key.to_string();
        self.conn
            .call(move |conn| -> Result<Option<Vec<CacheItem>>, Error> {
                let tx = conn.transaction()?;
                if tx.execute("DELETE FROM cache_groups WHERE group_key = ?1", params![group_key])? == 0 {
                    return Ok(None);
                }

                let orphans = {
                    let mut stmt = tx.prepare(&format!(
                        "SELECT {ITEM_COLUMNS} FROM cache_items
                         WHERE id NOT IN (SELECT item_id FROM cache_group_items)
                         ORDER BY id ASC"
                    ))?;
                    stmt.query_map([], item_from_row)?.collect::<Result<Vec<_>, _>>()?
                };
                for item in &orphans {
                    tx.execute("DELETE FROM cache_items WHERE id = ?1", params![item.id])?;
                }
                tx.commit()?;
                Ok(Some(orphans))
            })
            .await
            .map_err(Error::from)
    }
}
