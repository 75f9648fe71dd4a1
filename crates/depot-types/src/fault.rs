use std::fmt;

use serde::{Deserialize, Serialize};

/// Coarse classification of a Depot failure.
///
/// Every error type in the workspace maps onto one of these kinds so callers
/// can decide on retry or recovery without matching backend-specific
/// variants. Absence is not a fault: lookups return `Option::None`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FaultKind {
    /// A value could not be turned into bytes (or CSV cells).
    Serialization,
    /// Stored bytes could not be parsed back into the requested type.
    Deserialization,
    /// Records in one collection do not share a field layout.
    SchemaMismatch,
    /// Backend I/O failed (network, permission, quota, disk).
    Storage,
    /// The backend detected a conflicting concurrent write.
    Concurrency,
    /// The identifier is already taken and the backend rejects duplicates.
    Conflict,
    /// A cancellation signal was observed before the commit was applied.
    Cancelled,
    /// The caller passed something malformed (bad key, bad id).
    InvalidInput,
}

impl FaultKind {
    /// Whether the same call could succeed if retried unchanged.
    ///
    /// Depot never retries on its own; this is advice for callers.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Storage | Self::Concurrency | Self::Cancelled)
    }
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Serialization => "serialization",
            Self::Deserialization => "deserialization",
            Self::SchemaMismatch => "schema-mismatch",
            Self::Storage => "storage",
            Self::Concurrency => "concurrency",
            Self::Conflict => "conflict",
            Self::Cancelled => "cancelled",
            Self::InvalidInput => "invalid-input",
        };
        f.write_str(name)
    }
}
