//! SQLite-backed persistence for cache groups and items.
//!
//! This module provides the group/item store using SQLite with async access
//! via tokio-rusqlite. It supports:
//!
//! - Idempotent fetch-or-create of groups and `(item_key, variant)` items
//! - Transactional group writes with must-have membership
//! - Completion checks over a group's must-have items
//! - A content-addressed on-disk store for response bodies

pub mod connection;
pub mod files;
pub mod groups;
pub mod items;
pub mod migrations;

pub use crate::Error;

pub use connection::CacheDb;
pub use files::{FileStore, StoredResponse};
pub use groups::{CacheGroup, GroupBatch, GroupItem, GroupStatus};
pub use items::{CacheItem, ItemSpec};
