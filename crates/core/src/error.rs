//! Unified error types for satchel.
//!
//! Every failure that can abort a cache-population call maps to one of these
//! variants. Lookups never surface them; a failed lookup is a cache miss.

use rmcp::model::{ErrorCode, ErrorData as McpError};
use tokio_rusqlite::rusqlite;

/// Which discovery list failed to fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListKind {
    OfflineResources,
    MediaList,
}

impl std::fmt::Display for ListKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ListKind::OfflineResources => f.write_str("offline resource list"),
            ListKind::MediaList => f.write_str("media list"),
        }
    }
}

/// Unified error types for the satchel cache.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid input parameters.
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// A request could not be built (bad URL, unsupported form).
    #[error("MALFORMED_REQUEST: {0}")]
    MalformedRequest(String),

    /// One of the discovery lists failed to fetch.
    #[error("LIST_FETCH_FAILED: {kind}: {reason}")]
    ListFetchFailed { kind: ListKind, reason: String },

    /// A request expected to carry cache metadata is missing a header.
    #[error("MISSING_HEADER: {0}")]
    MissingHeader(&'static str),

    /// No persisted entry for the given key.
    #[error("CACHE_MISS: {0}")]
    CacheMiss(String),

    /// Database operation failed.
    #[error("CACHE_ERROR: {0}")]
    Database(tokio_rusqlite::Error),

    /// Group or item could not be fetched or created.
    #[error("CACHE_ERROR: unable to resolve {0}")]
    Unresolvable(String),

    /// Migration failed to apply.
    #[error("CACHE_ERROR: migration failed: {0}")]
    MigrationFailed(String),

    /// Reading or writing stored response files failed.
    #[error("STORE_ERROR: {0}")]
    Io(#[from] std::io::Error),

    /// A stored header file could not be encoded or decoded.
    #[error("CORRUPT_ENTRY: {0}")]
    CorruptEntry(#[from] serde_json::Error),

    /// Invalid URL.
    #[error("INVALID_URL: {0}")]
    InvalidUrl(String),

    /// HTTP error response or transport failure.
    #[error("HTTP_ERROR: {0}")]
    HttpError(String),

    /// Fetch response too large.
    #[error("FETCH_TOO_LARGE: {0}")]
    FetchTooLarge(String),

    /// The fetch was cancelled through the task tracker.
    #[error("CANCELLED: {0}")]
    Cancelled(String),
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Database(tokio_rusqlite::Error::Close(c)),
            _ => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Database(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(tokio_rusqlite::Error::Error(err))
    }
}

impl From<Error> for McpError {
    fn from(err: Error) -> Self {
        let code = match &err {
            Error::InvalidInput(_) => -32602,
            Error::MalformedRequest(_) | Error::InvalidUrl(_) => -32003,
            Error::ListFetchFailed { .. } => -32004,
            Error::MissingHeader(_) => -32005,
            Error::CacheMiss(_) => -32001,
            Error::Database(_) | Error::Unresolvable(_) | Error::MigrationFailed(_) => -32002,
            Error::Io(_) => -32006,
            Error::CorruptEntry(_) => -32010,
            Error::HttpError(_) => -32008,
            Error::FetchTooLarge(_) => -32007,
            Error::Cancelled(_) => -32009,
        };

        McpError { code: ErrorCode(code), message: err.to_string().into(), data: None }
    }
}
