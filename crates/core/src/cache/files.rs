//! On-disk store for response bodies.
//!
//! Each `(item_key, variant)` maps to a body file and a JSON header file in
//! one flat directory, named by the item type's key generator. Writes go to
//! a temporary file first and are renamed into place, so a reader sees
//! either the previous response or the new one.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::Error;
use crate::headers::ItemType;
use crate::keys::generator_for;

/// A stored HTTP response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredResponse {
    pub url: String,
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    #[serde(skip)]
    pub body: Vec<u8>,
}

impl StoredResponse {
    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    pub fn etag(&self) -> Option<&str> {
        self.header("etag")
    }

    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Directory-backed response store.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Open a store rooted at `root`, creating the directory if needed.
    pub async fn open(root: impl AsRef<Path>) -> Result<Self, Error> {
        let root = root.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn paths(&self, item_type: ItemType, item_key: &str, variant: Option<&str>) -> (PathBuf, PathBuf) {
        let generator = generator_for(item_type);
        (
            self.root.join(generator.unique_file_name(item_key, variant)),
            self.root.join(generator.unique_header_file_name(item_key, variant)),
        )
    }

    /// Persist a response for `(item_key, variant)`.
    pub async fn write(
        &self, item_type: ItemType, item_key: &str, variant: Option<&str>, response: &StoredResponse,
    ) -> Result<(), Error> {
        let (body_path, header_path) = self.paths(item_type, item_key, variant);
        let header_json = serde_json::to_vec(response)?;

        write_atomic(&header_path, &header_json).await?;
        write_atomic(&body_path, &response.body).await?;

        tracing::debug!(item_key, variant, bytes = response.body.len(), "stored response");
        Ok(())
    }

    /// Read the response for `(item_key, variant)`, or None if nothing is stored.
    pub async fn read(
        &self, item_type: ItemType, item_key: &str, variant: Option<&str>,
    ) -> Result<Option<StoredResponse>, Error> {
        let (body_path, header_path) = self.paths(item_type, item_key, variant);

        let header_json = match tokio::fs::read(&header_path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let body = match tokio::fs::read(&body_path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let mut response: StoredResponse = serde_json::from_slice(&header_json)?;
        response.body = body;
        Ok(Some(response))
    }

    /// Whether a complete response is stored for `(item_key, variant)`.
    pub async fn contains(&self, item_type: ItemType, item_key: &str, variant: Option<&str>) -> bool {
        let (body_path, header_path) = self.paths(item_type, item_key, variant);
        tokio::fs::try_exists(&body_path).await.unwrap_or(false)
            && tokio::fs::try_exists(&header_path).await.unwrap_or(false)
    }

    /// Remove both files for `(item_key, variant)`. Missing files are ignored.
    pub async fn remove(&self, item_type: ItemType, item_key: &str, variant: Option<&str>) -> Result<(), Error> {
        let (body_path, header_path) = self.paths(item_type, item_key, variant);
        for path in [body_path, header_path] {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), Error> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(format!(".{}.tmp", TMP_COUNTER.fetch_add(1, Ordering::Relaxed)));
    let tmp = PathBuf::from(tmp);
    tokio::fs::write(&tmp, bytes).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(body: &[u8]) -> StoredResponse {
        let mut headers = BTreeMap::new();
        headers.insert("Content-Type".to_string(), "image/jpeg".to_string());
        headers.insert("ETag".to_string(), "\"v1\"".to_string());
        StoredResponse {
            url: "https://upload.wikimedia.org/x.jpg".into(),
            status: 200,
            headers,
            body: body.to_vec(),
        }
    }

    #[tokio::test]
    async fn test_write_and_read() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).await.unwrap();

        store
            .write(ItemType::Image, "k", Some("100"), &response(b"jpeg bytes"))
            .await
            .unwrap();

        let read = store.read(ItemType::Image, "k", Some("100")).await.unwrap().unwrap();
        assert_eq!(read.body, b"jpeg bytes");
        assert_eq!(read.status, 200);
        assert_eq!(read.content_type(), Some("image/jpeg"));
        assert_eq!(read.etag(), Some("\"v1\""));
    }

    #[tokio::test]
    async fn test_read_missing() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).await.unwrap();
        assert!(store.read(ItemType::Image, "k", Some("100")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_variants_stored_separately() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).await.unwrap();
        store.write(ItemType::Image, "k", Some("100"), &response(b"small")).await.unwrap();
        store.write(ItemType::Image, "k", Some("200"), &response(b"large")).await.unwrap();

        let small = store.read(ItemType::Image, "k", Some("100")).await.unwrap().unwrap();
        let large = store.read(ItemType::Image, "k", Some("200")).await.unwrap().unwrap();
        assert_eq!(small.body, b"small");
        assert_eq!(large.body, b"large");
    }

    #[tokio::test]
    async fn test_corrupt_header_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).await.unwrap();
        store.write(ItemType::Image, "k", Some("100"), &response(b"jpeg")).await.unwrap();

        let (_, header_path) = store.paths(ItemType::Image, "k", Some("100"));
        tokio::fs::write(&header_path, b"{not json").await.unwrap();

        let err = store.read(ItemType::Image, "k", Some("100")).await.unwrap_err();
        assert!(matches!(err, Error::CorruptEntry(_)));
        assert!(err.to_string().starts_with("CORRUPT_ENTRY:"));
    }

    #[tokio::test]
    async fn test_remove() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).await.unwrap();
        store.write(ItemType::Article, "k", None, &response(b"html")).await.unwrap();

        store.remove(ItemType::Article, "k", None).await.unwrap();
        store.remove(ItemType::Article, "k", None).await.unwrap();
        assert!(store.read(ItemType::Article, "k", None).await.unwrap().is_none());
    }
}
