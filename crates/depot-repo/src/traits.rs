//! The [`Repository`] and [`UnitOfWork`] contracts.
//!
//! Any backend (relational session, key-value table, ...) implements these
//! traits to give callers CRUD and predicate queries over an entity type
//! without naming the backend.

use async_trait::async_trait;
use depot_types::{Entity, EntityId, Predicate};

use crate::cancel::CancellationToken;
use crate::capability::{CommitSemantics, FindCapability, QueryPlan, WriteSemantics};
use crate::error::RepoResult;

/// CRUD and query access to entities of type `T`.
///
/// Implementations must be thread-safe (`Send + Sync`). They never cache
/// entity state across calls and never narrow or reorder results silently.
/// Concurrency control between callers is whatever the backend provides
/// natively.
#[async_trait]
pub trait Repository<T: Entity>: Send + Sync {
    /// How `find` executes on this backend.
    fn find_capability(&self) -> FindCapability;

    /// Declared behaviour for duplicate adds and updates of missing entities.
    fn write_semantics(&self) -> WriteSemantics;

    /// Describe how `find(predicate)` would run without running it.
    fn explain(&self, predicate: &Predicate) -> QueryPlan;

    /// Look up one entity by identifier.
    ///
    /// Returns `Ok(None)` if it does not exist.
    async fn get_by_id(&self, id: EntityId) -> RepoResult<Option<T>>;

    /// Every entity in the collection, fully materialized.
    async fn get_all(&self) -> RepoResult<Vec<T>>;

    /// Store a new entity. See [`write_semantics`](Self::write_semantics)
    /// for what happens when the identifier is taken.
    async fn add(&self, entity: T) -> RepoResult<()>;

    /// Replace the stored state for `entity.id()`. See
    /// [`write_semantics`](Self::write_semantics) for missing entities.
    async fn update(&self, entity: T) -> RepoResult<()>;

    /// Remove an entity. Succeeds if it does not exist.
    async fn delete(&self, id: EntityId) -> RepoResult<()>;

    /// Entities satisfying `predicate`.
    ///
    /// The result set is the same on every backend; check
    /// [`find_capability`](Self::find_capability) for the cost.
    async fn find(&self, predicate: &Predicate) -> RepoResult<Vec<T>>;

    /// Entities accepted by an opaque filter.
    ///
    /// Closures cannot be translated, so this always fetches the full
    /// extent and filters client-side, whatever the backend supports.
    async fn find_matching(
        &self,
        filter: &(dyn for<'a> Fn(&'a T) -> bool + Send + Sync),
    ) -> RepoResult<Vec<T>> {
        let all = self.get_all().await?;
        Ok(all.into_iter().filter(|entity| filter(entity)).collect())
    }
}

/// Commit boundary for repository mutations.
///
/// A unit of work is scoped to one logical operation. Dropping it releases
/// the underlying session and discards anything not yet committed.
#[async_trait]
pub trait UnitOfWork: Send + Sync {
    /// Whether `save_changes` is an atomic commit or a no-op.
    fn commit_semantics(&self) -> CommitSemantics;

    /// Number of mutations waiting for `save_changes`.
    fn pending_changes(&self) -> usize;

    /// Commit every pending mutation and return how many were applied.
    ///
    /// If `cancel` fires before the commit is applied, returns
    /// `RepoError::Cancelled`; stored state stays as of the last successful
    /// commit and the pending mutations are kept.
    async fn save_changes(&self, cancel: &CancellationToken) -> RepoResult<usize>;
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use serde::{Deserialize, Serialize};

    use super::*;
    use crate::capability::{AddSemantics, UpdateSemantics};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Note {
        id: EntityId,
        text: String,
    }

    impl Entity for Note {
        const COLLECTION: &'static str = "notes";

        fn id(&self) -> EntityId {
            self.id
        }
    }

    /// Only the required methods; `find_matching` comes from the trait.
    #[derive(Default)]
    struct VecRepository {
        notes: Mutex<Vec<Note>>,
    }

    #[async_trait]
    impl Repository<Note> for VecRepository {
        fn find_capability(&self) -> FindCapability {
            FindCapability::FullScan
        }

        fn write_semantics(&self) -> WriteSemantics {
            WriteSemantics {
                add: AddSemantics::Overwrite,
                update: UpdateSemantics::Upsert,
            }
        }

        fn explain(&self, predicate: &Predicate) -> QueryPlan {
            QueryPlan::FullScan {
                extent: Note::COLLECTION.into(),
                filter: predicate.to_string(),
            }
        }

        async fn get_by_id(&self, id: EntityId) -> RepoResult<Option<Note>> {
            Ok(self.notes.lock().unwrap().iter().find(|n| n.id == id).cloned())
        }

        async fn get_all(&self) -> RepoResult<Vec<Note>> {
            Ok(self.notes.lock().unwrap().clone())
        }

        async fn add(&self, entity: Note) -> RepoResult<()> {
            self.notes.lock().unwrap().push(entity);
            Ok(())
        }

        async fn update(&self, entity: Note) -> RepoResult<()> {
            self.add(entity).await
        }

        async fn delete(&self, id: EntityId) -> RepoResult<()> {
            self.notes.lock().unwrap().retain(|n| n.id != id);
            Ok(())
        }

        async fn find(&self, predicate: &Predicate) -> RepoResult<Vec<Note>> {
            let all = self.get_all().await?;
            Ok(all
                .into_iter()
                .filter(|n| predicate.evaluate(n).unwrap_or(false))
                .collect())
        }
    }

    #[tokio::test]
    async fn default_find_matching_filters_get_all() {
        let repo = VecRepository::default();
        for text in ["alpha", "beta", "gamma"] {
            repo.add(Note { id: EntityId::new(), text: text.into() }).await.unwrap();
        }

        // The closure borrows a local for the duration of the call.
        let needle = String::from("mm");
        let found = repo
            .find_matching(&|n: &Note| n.text.contains(needle.as_str()))
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].text, "gamma");

        let none = repo.find_matching(&|_: &Note| false).await.unwrap();
        assert!(none.is_empty());
    }
}
