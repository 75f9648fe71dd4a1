use depot_blob::BlobError;
use depot_types::FaultKind;
use thiserror::Error;

/// Errors from structured-data adapters.
///
/// Shape errors (`Serialization`, `SchemaMismatch`) are raised before any
/// blob I/O happens. A missing blob is not an error.
#[derive(Debug, Error)]
pub enum DataError {
    /// The value could not be encoded.
    #[error("cannot serialize {key}: {reason}")]
    Serialization { key: String, reason: String },

    /// The stored bytes could not be decoded into the requested type.
    #[error("cannot deserialize {key}: {reason}")]
    Deserialization { key: String, reason: String },

    /// A CSV record does not share the collection's field layout.
    #[error("schema mismatch in {key} at record {record}: expected {expected:?}, found {found:?}")]
    SchemaMismatch {
        key: String,
        record: usize,
        expected: Vec<String>,
        found: Vec<String>,
    },

    /// The underlying blob store failed.
    #[error("storage error: {0}")]
    Storage(#[from] BlobError),
}

impl DataError {
    pub fn kind(&self) -> FaultKind {
        match self {
            Self::Serialization { .. } => FaultKind::Serialization,
            Self::Deserialization { .. } => FaultKind::Deserialization,
            Self::SchemaMismatch { .. } => FaultKind::SchemaMismatch,
            Self::Storage(e) => e.kind(),
        }
    }
}

/// Result alias for structured-data operations.
pub type DataResult<T> = Result<T, DataError>;
