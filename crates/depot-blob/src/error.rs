use depot_types::{BlobKey, FaultKind, TypeError};

/// Errors from blob store operations.
///
/// A missing blob is not an error: `download` returns `Ok(None)`.
#[derive(Debug, thiserror::Error)]
pub enum BlobError {
    /// The key failed validation.
    #[error(transparent)]
    InvalidKey(#[from] TypeError),

    /// I/O error from the underlying storage backend.
    #[error("I/O error on {key}: {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    /// The backend refused or failed the request for a non-I/O reason.
    #[error("backend error on {key}: {reason}")]
    Backend { key: String, reason: String },

    /// A blocking storage task was cancelled or panicked.
    #[error("storage task failed: {0}")]
    Task(String),
}

impl BlobError {
    pub(crate) fn io(key: &BlobKey, source: std::io::Error) -> Self {
        Self::Io {
            key: key.to_string(),
            source,
        }
    }

    pub fn kind(&self) -> FaultKind {
        match self {
            Self::InvalidKey(e) => e.kind(),
            Self::Io { .. } | Self::Backend { .. } | Self::Task(_) => FaultKind::Storage,
        }
    }
}

/// Result alias for blob store operations.
pub type BlobResult<T> = Result<T, BlobError>;
