use thiserror::Error;

use crate::fault::FaultKind;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid entity id: {0}")]
    InvalidEntityId(String),

    #[error("invalid blob key {key:?}: {reason}")]
    InvalidBlobKey { key: String, reason: String },

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl TypeError {
    pub fn kind(&self) -> FaultKind {
        match self {
            Self::InvalidEntityId(_) | Self::InvalidBlobKey { .. } => FaultKind::InvalidInput,
            Self::Serialization(_) => FaultKind::Serialization,
        }
    }
}
