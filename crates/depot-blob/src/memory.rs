use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use bytes::Bytes;
use depot_types::BlobKey;

use crate::error::{BlobError, BlobResult};
use crate::traits::BlobStore;

/// In-memory, map-based blob store.
///
/// Intended for tests and embedding. Blobs are held behind a `RwLock`;
/// `Bytes` makes reads a reference-count bump rather than a copy.
pub struct InMemoryBlobStore {
    blobs: RwLock<BTreeMap<BlobKey, Bytes>>,
}

impl InMemoryBlobStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            blobs: RwLock::new(BTreeMap::new()),
        }
    }

    /// Number of blobs currently stored.
    pub fn len(&self) -> usize {
        self.blobs.read().expect("lock poisoned").len()
    }

    /// Returns `true` if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.blobs.read().expect("lock poisoned").is_empty()
    }

    /// Total bytes across all stored blobs.
    pub fn total_bytes(&self) -> u64 {
        self.blobs
            .read()
            .expect("lock poisoned")
            .values()
            .map(|b| b.len() as u64)
            .sum()
    }

    /// Remove all blobs from the store.
    pub fn clear(&self) {
        self.blobs.write().expect("lock poisoned").clear();
    }

    fn read_map(&self, key: &BlobKey) -> BlobResult<RwLockReadGuard<'_, BTreeMap<BlobKey, Bytes>>> {
        self.blobs.read().map_err(|e| BlobError::Backend {
            key: key.to_string(),
            reason: format!("lock poisoned: {e}"),
        })
    }

    fn write_map(
        &self,
        key: &BlobKey,
    ) -> BlobResult<RwLockWriteGuard<'_, BTreeMap<BlobKey, Bytes>>> {
        self.blobs.write().map_err(|e| BlobError::Backend {
            key: key.to_string(),
            reason: format!("lock poisoned: {e}"),
        })
    }
}

impl Default for InMemoryBlobStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn upload(&self, key: &BlobKey, data: Bytes) -> BlobResult<()> {
        tracing::debug!(%key, bytes = data.len(), "memory upload");
        self.write_map(key)?.insert(key.clone(), data);
        Ok(())
    }

    async fn download(&self, key: &BlobKey) -> BlobResult<Option<Bytes>> {
        Ok(self.read_map(key)?.get(key).cloned())
    }

    async fn delete(&self, key: &BlobKey) -> BlobResult<()> {
        let removed = self.write_map(key)?.remove(key).is_some();
        tracing::debug!(%key, removed, "memory delete");
        Ok(())
    }

    async fn list(&self, prefix: &str) -> BlobResult<Vec<BlobKey>> {
        let map = self.blobs.read().map_err(|e| BlobError::Backend {
            key: prefix.to_string(),
            reason: format!("lock poisoned: {e}"),
        })?;
        // BTreeMap iteration is already sorted.
        Ok(map
            .range::<str, _>((Bound::Included(prefix), Bound::Unbounded))
            .take_while(|(k, _)| k.has_prefix(prefix))
            .map(|(k, _)| k.clone())
            .collect())
    }

    async fn exists(&self, key: &BlobKey) -> BlobResult<bool> {
        Ok(self.read_map(key)?.contains_key(key))
    }
}

impl std::fmt::Debug for InMemoryBlobStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryBlobStore")
            .field("blob_count", &self.len())
            .finish()
    }
}
