use async_trait::async_trait;
use bytes::Bytes;
use depot_types::BlobKey;

use crate::error::BlobResult;

/// Key to byte-stream storage.
///
/// All implementations must satisfy these invariants:
/// - `upload` overwrites whatever was stored under the key.
/// - `download` of a missing key is `Ok(None)`, never an error.
/// - `delete` is idempotent: deleting a missing key succeeds.
/// - Whole values only. No operation reads or writes a partial byte range.
/// - Backend errors are propagated unmodified, never retried or swallowed.
///
/// The store never interprets blob contents.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `data` under `key`, replacing any existing value.
    async fn upload(&self, key: &BlobKey, data: Bytes) -> BlobResult<()>;

    /// Read the complete value stored under `key`.
    ///
    /// Returns `Ok(None)` if the key does not exist.
    async fn download(&self, key: &BlobKey) -> BlobResult<Option<Bytes>>;

    /// Remove `key`. Succeeds whether or not the key existed.
    async fn delete(&self, key: &BlobKey) -> BlobResult<()>;

    /// List keys starting with `prefix`, sorted ascending.
    ///
    /// Pass `""` to list everything.
    async fn list(&self, prefix: &str) -> BlobResult<Vec<BlobKey>>;

    /// Check whether a key exists.
    ///
    /// Default implementation downloads the value. Backends with a cheap
    /// metadata lookup should override it.
    async fn exists(&self, key: &BlobKey) -> BlobResult<bool> {
        Ok(self.download(key).await?.is_some())
    }
}
