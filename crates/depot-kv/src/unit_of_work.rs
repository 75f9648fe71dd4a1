//! [`UnitOfWork`] for key-value tables.

use async_trait::async_trait;
use depot_repo::{CancellationToken, CommitSemantics, RepoError, RepoResult, UnitOfWork};

/// Key-value writes are applied as they are issued, so there is never
/// anything left to commit. `save_changes` exists to satisfy callers written
/// against [`UnitOfWork`] and always reports zero applied changes.
#[derive(Clone, Copy, Debug, Default)]
pub struct KeyValueUnitOfWork;

impl KeyValueUnitOfWork {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl UnitOfWork for KeyValueUnitOfWork {
    fn commit_semantics(&self) -> CommitSemantics {
        CommitSemantics::Immediate
    }

    fn pending_changes(&self) -> usize {
        0
    }

    async fn save_changes(&self, cancel: &CancellationToken) -> RepoResult<usize> {
        if cancel.is_cancelled() {
            return Err(RepoError::Cancelled);
        }
        tracing::debug!("key-value save_changes: writes already applied");
        Ok(0)
    }
}
