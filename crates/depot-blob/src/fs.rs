//! Filesystem-backed object store.
//!
//! [`FsBlobStore`] keeps one file per key under a root directory, mapping
//! `/` in keys to subdirectories. It follows object-store semantics:
//! uploads replace the whole object atomically, a missing key downloads as
//! absent, and deleting a missing key succeeds.

use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use depot_types::BlobKey;
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::error::{BlobError, BlobResult};
use crate::traits::BlobStore;

/// Prefix for in-flight upload files. These are never listed, so keys whose
/// last segment starts with it are rejected.
const UPLOAD_PREFIX: &str = ".depot-upload-";

/// Configuration for [`FsBlobStore`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FsBlobStoreConfig {
    /// Directory holding the objects.
    pub root: PathBuf,
    /// Create `root` if it does not exist.
    pub create_root: bool,
}

impl Default for FsBlobStoreConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from(".depot/blobs"),
            create_root: true,
        }
    }
}

/// Object store rooted at a local directory.
///
/// Keys `a/b` and `a` cannot coexist: the first needs `a` to be a
/// directory, the second a file. Such uploads fail with an I/O error.
#[derive(Clone, Debug)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    /// Open a store, creating the root directory if configured to.
    pub async fn open(config: FsBlobStoreConfig) -> BlobResult<Self> {
        let root = config.root;
        if config.create_root {
            tokio::fs::create_dir_all(&root)
                .await
                .map_err(|source| BlobError::Io {
                    key: root.display().to_string(),
                    source,
                })?;
        } else if !tokio::fs::try_exists(&root).await.unwrap_or(false) {
            return Err(BlobError::Backend {
                key: root.display().to_string(),
                reason: "root directory does not exist".into(),
            });
        }
        tracing::debug!(root = %root.display(), "opened filesystem blob store");
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &BlobKey) -> PathBuf {
        let mut path = self.root.clone();
        path.extend(key.segments());
        path
    }
}

async fn blocking<T, F>(f: F) -> BlobResult<T>
where
    F: FnOnce() -> BlobResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| BlobError::Task(e.to_string()))?
}

fn write_atomic(key: &BlobKey, path: &Path, data: &[u8]) -> BlobResult<()> {
    let parent = path.parent().ok_or_else(|| BlobError::Backend {
        key: key.to_string(),
        reason: "key maps to the store root".into(),
    })?;
    std::fs::create_dir_all(parent).map_err(|e| BlobError::io(key, e))?;

    let mut tmp = tempfile::Builder::new()
        .prefix(UPLOAD_PREFIX)
        .tempfile_in(parent)
        .map_err(|e| BlobError::io(key, e))?;
    tmp.write_all(data).map_err(|e| BlobError::io(key, e))?;
    tmp.as_file().sync_all().map_err(|e| BlobError::io(key, e))?;
    tmp.persist(path).map_err(|e| BlobError::io(key, e.error))?;
    Ok(())
}

/// Remove now-empty directories between `path` and `root`.
fn prune_empty_parents(root: &Path, path: &Path) {
    let mut dir = path.parent();
    while let Some(d) = dir {
        if d == root || !d.starts_with(root) {
            break;
        }
        // Fails on non-empty directories, which ends the walk.
        if std::fs::remove_dir(d).is_err() {
            break;
        }
        dir = d.parent();
    }
}

/// Errors that mean "no object at this path". A key nested under a file
/// (`a/b` when `a` is a file) fails with `NotADirectory`.
fn is_absent(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        std::io::ErrorKind::NotFound | std::io::ErrorKind::NotADirectory
    )
}

fn key_from_path(root: &Path, path: &Path) -> Option<BlobKey> {
    let rel = path.strip_prefix(root).ok()?;
    let mut segments = Vec::new();
    for component in rel.components() {
        segments.push(component.as_os_str().to_str()?);
    }
    BlobKey::new(segments.join("/")).ok()
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn upload(&self, key: &BlobKey, data: Bytes) -> BlobResult<()> {
        if key
            .segments()
            .last()
            .is_some_and(|name| name.starts_with(UPLOAD_PREFIX))
        {
            return Err(BlobError::Backend {
                key: key.to_string(),
                reason: format!("names starting with {UPLOAD_PREFIX} are reserved"),
            });
        }
        let path = self.path_for(key);
        let owned_key = key.clone();
        let len = data.len();
        blocking(move || write_atomic(&owned_key, &path, &data)).await?;
        tracing::debug!(%key, bytes = len, "fs upload");
        Ok(())
    }

    async fn download(&self, key: &BlobKey) -> BlobResult<Option<Bytes>> {
        let path = self.path_for(key);
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => return Ok(None),
            Err(e) if is_absent(&e) => return Ok(None),
            Err(e) => return Err(BlobError::io(key, e)),
        }
        match tokio::fs::read(&path).await {
            Ok(data) => {
                tracing::debug!(%key, bytes = data.len(), "fs download");
                Ok(Some(Bytes::from(data)))
            }
            // Deleted between the metadata check and the read.
            Err(e) if is_absent(&e) => Ok(None),
            Err(e) => Err(BlobError::io(key, e)),
        }
    }

    async fn delete(&self, key: &BlobKey) -> BlobResult<()> {
        let path = self.path_for(key);
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => {}
            // A directory holds other keys; this key itself is absent.
            Ok(_) => return Ok(()),
            Err(e) if is_absent(&e) => return Ok(()),
            Err(e) => return Err(BlobError::io(key, e)),
        }
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                let root = self.root.clone();
                blocking(move || {
                    prune_empty_parents(&root, &path);
                    Ok(())
                })
                .await?;
                tracing::debug!(%key, "fs delete");
                Ok(())
            }
            Err(e) if is_absent(&e) => Ok(()),
            Err(e) => Err(BlobError::io(key, e)),
        }
    }

    async fn list(&self, prefix: &str) -> BlobResult<Vec<BlobKey>> {
        let root = self.root.clone();
        let prefix = prefix.to_string();
        blocking(move || {
            let mut keys = Vec::new();
            for entry in WalkDir::new(&root).min_depth(1) {
                let entry = entry.map_err(|e| BlobError::Backend {
                    key: prefix.clone(),
                    reason: e.to_string(),
                })?;
                if !entry.file_type().is_file() {
                    continue;
                }
                let in_flight = entry
                    .file_name()
                    .to_str()
                    .is_some_and(|name| name.starts_with(UPLOAD_PREFIX));
                if in_flight {
                    continue;
                }
                if let Some(key) = key_from_path(&root, entry.path()) {
                    if key.has_prefix(&prefix) {
                        keys.push(key);
                    }
                }
            }
            keys.sort();
            Ok(keys)
        })
        .await
    }

    async fn exists(&self, key: &BlobKey) -> BlobResult<bool> {
        match tokio::fs::metadata(self.path_for(key)).await {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if is_absent(&e) => Ok(false),
            Err(e) => Err(BlobError::io(key, e)),
        }
    }
}
