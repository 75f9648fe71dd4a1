//! Declared backend properties.
//!
//! Backends satisfy the same contracts with different costs and guarantees.
//! These types make the differences part of the contract instead of leaving
//! callers to discover them.

use std::fmt;

use serde::{Deserialize, Serialize};

/// How a repository executes `find`.
///
/// Results are identical either way; only the cost differs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FindCapability {
    /// The predicate is translated into the backend's native query and
    /// evaluated where the data lives.
    PushDown,
    /// The whole extent is fetched and filtered client-side. O(n) in the
    /// extent size regardless of selectivity.
    FullScan,
}

impl FindCapability {
    pub fn is_full_scan(&self) -> bool {
        matches!(self, Self::FullScan)
    }
}

/// What a repository will do for one `find` call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueryPlan {
    PushDown {
        /// The backend-native query text.
        native: String,
    },
    FullScan {
        /// The extent that will be read in full.
        extent: String,
        /// Human-readable form of the client-side filter.
        filter: String,
    },
}

impl QueryPlan {
    pub fn capability(&self) -> FindCapability {
        match self {
            Self::PushDown { .. } => FindCapability::PushDown,
            Self::FullScan { .. } => FindCapability::FullScan,
        }
    }
}

impl fmt::Display for QueryPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PushDown { native } => write!(f, "push-down: {native}"),
            Self::FullScan { extent, filter } => {
                write!(f, "full scan of {extent}, then filter {filter}")
            }
        }
    }
}

/// Behaviour of `add` when the identifier is already stored.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AddSemantics {
    /// Fails with `RepoError::AlreadyExists`.
    Reject,
    /// Replaces the stored entity.
    Overwrite,
}

/// Behaviour of `update` when the identifier is not stored.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UpdateSemantics {
    /// Fails with `RepoError::Concurrency`.
    RequireExisting,
    /// Inserts the entity.
    Upsert,
}

/// Declared duplicate / missing-entity behaviour of a repository.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WriteSemantics {
    pub add: AddSemantics,
    pub update: UpdateSemantics,
}

/// What `save_changes` guarantees.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommitSemantics {
    /// All pending mutations apply together or not at all.
    Atomic,
    /// Mutations were applied as they were issued; `save_changes` has
    /// nothing to do and offers no atomicity across calls.
    Immediate,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_reports_capability() {
        let scan = QueryPlan::FullScan {
            extent: "users".into(),
            filter: "age > 3".into(),
        };
        assert!(scan.capability().is_full_scan());
        assert_eq!(scan.to_string(), "full scan of users, then filter age > 3");

        let pushed = QueryPlan::PushDown {
            native: "SELECT 1".into(),
        };
        assert_eq!(pushed.capability(), FindCapability::PushDown);
    }
}
