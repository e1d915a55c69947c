//! Core types and shared functionality for satchel.
//!
//! This crate provides:
//! - Group/item persistence with a SQLite backend
//! - The on-disk response store
//! - Cache key generation and the request metadata contract
//! - Image variant selection
//! - Unified error types and configuration

pub mod cache;
pub mod config;
pub mod error;
pub mod headers;
pub mod keys;
pub mod variant;

pub use cache::{CacheDb, CacheGroup, CacheItem, FileStore, GroupBatch, GroupStatus, ItemSpec, StoredResponse};
pub use config::{AppConfig, ConfigError};
pub use error::{Error, ListKind};
pub use headers::ItemType;
pub use variant::DensityClass;
