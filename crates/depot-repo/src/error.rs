//! Error types for repository and unit-of-work operations.

use depot_types::{EntityId, FaultKind};
use thiserror::Error;

/// Errors that can occur during repository operations.
///
/// Absence is not an error: point lookups return `Ok(None)` and deletes of
/// missing entities succeed.
#[derive(Debug, Error)]
pub enum RepoError {
    /// The entity could not be serialized into the backend's stored form.
    #[error("cannot serialize {collection} entity: {reason}")]
    Serialization { collection: String, reason: String },

    /// A stored item could not be decoded into the entity type.
    #[error("cannot deserialize {collection} entity: {reason}")]
    Deserialization { collection: String, reason: String },

    /// The backend rejects a second entity with the same identifier.
    #[error("{collection} entity already exists: {id}")]
    AlreadyExists { collection: String, id: EntityId },

    /// The backend detected a conflicting write (missing row, moved version).
    #[error("concurrency conflict on {collection} entity {id}: {reason}")]
    Concurrency {
        collection: String,
        id: EntityId,
        reason: String,
    },

    /// Cancellation was observed before the commit was applied.
    #[error("operation cancelled before commit")]
    Cancelled,

    /// The entity violates a contract precondition (e.g. nil identifier).
    #[error("invalid {collection} entity: {reason}")]
    InvalidEntity { collection: String, reason: String },

    /// The backend failed for an I/O or infrastructure reason.
    #[error("storage error: {0}")]
    Storage(String),
}

impl RepoError {
    pub fn kind(&self) -> FaultKind {
        match self {
            Self::Serialization { .. } => FaultKind::Serialization,
            Self::Deserialization { .. } => FaultKind::Deserialization,
            Self::AlreadyExists { .. } => FaultKind::Conflict,
            Self::Concurrency { .. } => FaultKind::Concurrency,
            Self::Cancelled => FaultKind::Cancelled,
            Self::InvalidEntity { .. } => FaultKind::InvalidInput,
            Self::Storage(_) => FaultKind::Storage,
        }
    }
}

/// Convenience type alias for repository operations.
pub type RepoResult<T> = std::result::Result<T, RepoError>;
