//! Cache item operations.
//!
//! An item is one cached resource response, identified by
//! `(item_key, variant)`. Items are created before their bytes exist and
//! flipped to downloaded once the file writer has stored the body.

use super::connection::CacheDb;
use crate::Error;
use crate::headers::ItemType;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite::{self, Connection, Row};

pub(crate) const ITEM_COLUMNS: &str =
    "id, item_key, variant, url, is_downloaded, etag, created_at, downloaded_at, item_type";

/// A persisted cache item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct CacheItem {
    pub id: i64,
    pub item_key: String,
    pub variant: Option<String>,
    pub url: String,
    pub is_downloaded: bool,
    pub etag: Option<String>,
    pub created_at: String,
    pub downloaded_at: Option<String>,
    pub item_type: ItemType,
}

/// Identity and source URL of an item to fetch or create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemSpec {
    pub url: String,
    pub item_key: String,
    pub variant: Option<String>,
    pub item_type: ItemType,
}

impl ItemSpec {
    pub fn new(url: impl Into<String>, item_key: impl Into<String>, variant: Option<String>) -> Self {
        Self {
            url: url.into(),
            item_key: item_key.into(),
            variant: normalize_variant(variant),
            item_type: ItemType::default(),
        }
    }

    pub fn with_type(mut self, item_type: ItemType) -> Self {
        self.item_type = item_type;
        self
    }
}

/// Empty variants are stored as NULL.
pub(crate) fn normalize_variant(variant: Option<String>) -> Option<String> {
    variant.filter(|v| !v.is_empty())
}

pub(crate) fn item_from_row(row: &Row<'_>) -> rusqlite::Result<CacheItem> {
    Ok(CacheItem {
        id: row.get(0)?,
        item_key: row.get(1)?,
        variant: row.get(2)?,
        url: row.get(3)?,
        is_downloaded: row.get::<_, i32>(4)? == 1,
        etag: row.get(5)?,
        created_at: row.get(6)?,
        downloaded_at: row.get(7)?,
        item_type: ItemType::from_header(Some(row.get::<_, String>(8)?.as_str())),
    })
}

pub(crate) fn find_item(conn: &Connection, item_key: &str, variant: Option<&str>) -> Result<Option<CacheItem>, Error> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {ITEM_COLUMNS} FROM cache_items WHERE item_key = ?1 AND IFNULL(variant, '') = IFNULL(?2, '')"
    ))?;

    match stmt.query_row(params![item_key, variant], item_from_row) {
        Ok(item) => Ok(Some(item)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Fetch the item for `spec`, inserting it when absent.
pub(crate) fn fetch_or_create_item_in(conn: &Connection, spec: &ItemSpec) -> Result<CacheItem, Error> {
    if let Some(item) = find_item(conn, &spec.item_key, spec.variant.as_deref())? {
        return Ok(item);
    }

    let created_at = chrono::Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO cache_items (item_key, variant, url, item_type, is_downloaded, created_at)
         VALUES (?1, ?2, ?3, ?4, 0, ?5)",
        params![spec.item_key, spec.variant, spec.url, spec.item_type.as_str(), created_at],
    )?;

    find_item(conn, &spec.item_key, spec.variant.as_deref())?
        .ok_or_else(|| Error::Unresolvable(format!("item {}", spec.item_key)))
}

impl CacheDb {
    /// Fetch an item by `(item_key, variant)`, creating it if missing.
    ///
    /// Idempotent: concurrent calls for the same pair resolve to one row
    /// because every call runs on the connection thread.
    pub async fn fetch_or_create_item(
        &self, url: &str, item_key: &str, variant: Option<&str>,
    ) -> Result<CacheItem, Error> {
        let spec = ItemSpec::new(url, item_key, variant.map(str::to_string));
        self.conn
            .call(move |conn| -> Result<CacheItem, Error> { fetch_or_create_item_in(conn, &spec) })
            .await
            .map_err(Error::from)
    }

    /// Get an item by exact `(item_key, variant)`.
    pub async fn item(&self, item_key: &str, variant: Option<&str>) -> Result<Option<CacheItem>, Error> {
        let item_key = item_key.to_string();
        let variant = normalize_variant(variant.map(str::to_string));
        self.conn
            .call(move |conn| -> Result<Option<CacheItem>, Error> { find_item(conn, &item_key, variant.as_deref()) })
            .await
            .map_err(Error::from)
    }

    /// All items sharing `item_key`, regardless of variant.
    pub async fn all_variant_items(&self, item_key: &str) -> Result<Vec<CacheItem>, Error> {
        let item_key = item_key.to_string();
        self.conn
            .call(move |conn| -> Result<Vec<CacheItem>, Error> {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {ITEM_COLUMNS} FROM cache_items WHERE item_key = ?1 ORDER BY id ASC"
                ))?;
                let items = stmt
                    .query_map(params![item_key], item_from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(items)
            })
            .await
            .map_err(Error::from)
    }

    /// Mark an item downloaded, creating it first if needed.
    ///
    /// Called by the file writer once bytes are stored, and by the legacy
    /// importer for files that already exist on disk.
    pub async fn mark_downloaded(&self, spec: &ItemSpec, etag: Option<&str>) -> Result<CacheItem, Error> {
        let spec = spec.clone();
        let etag = etag.map(str::to_string);
        let downloaded_at = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<CacheItem, Error> {
                let tx = conn.transaction()?;
                let item = fetch_or_create_item_in(&tx, &spec)?;
                tx.execute(
                    "UPDATE cache_items SET is_downloaded = 1, downloaded_at = ?2, etag = COALESCE(?3, etag)
                     WHERE id = ?1",
                    params![item.id, downloaded_at, etag],
                )?;
                let updated = find_item(&tx, &spec.item_key, spec.variant.as_deref())?
                    .ok_or_else(|| Error::Unresolvable(format!("item {}", spec.item_key)))?;
                tx.commit()?;
                Ok(updated)
            })
            .await
            .map_err(Error::from)
    }

    /// Items no group references any more.
    pub async fn orphaned_items(&self) -> Result<Vec<CacheItem>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<CacheItem>, Error> {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {ITEM_COLUMNS} FROM cache_items
                     WHERE id NOT IN (SELECT item_id FROM cache_group_items)
                     ORDER BY id ASC"
                ))?;
                let items = stmt.query_map([], item_from_row)?.collect::<Result<Vec<_>, _>>()?;
                Ok(items)
            })
            .await
            .map_err(Error::from)
    }
}
