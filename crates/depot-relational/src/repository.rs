//! [`Repository`] over a relational session.

use std::marker::PhantomData;

use async_trait::async_trait;
use depot_repo::codec;
use depot_repo::{
    AddSemantics, FindCapability, QueryPlan, RepoResult, Repository, UpdateSemantics,
    WriteSemantics,
};
use depot_types::{Entity, EntityId, Predicate};

use crate::session::{Change, Session};
use crate::translate;

/// Repository for `T` whose writes are staged in a [`Session`] and applied
/// by [`save_changes`](depot_repo::UnitOfWork::save_changes).
///
/// `find` is pushed down: the predicate is translated to a `WHERE` clause
/// and evaluated inside the store.
pub struct SessionRepository<T> {
    session: Session,
    _entity: PhantomData<fn() -> T>,
}

impl<T: Entity> SessionRepository<T> {
    pub fn new(session: Session) -> Self {
        Self {
            session,
            _entity: PhantomData,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    async fn query(&self, predicate: &Predicate) -> RepoResult<Vec<T>> {
        let query = translate::select(T::COLLECTION, predicate);
        let rows = self
            .session
            .store()
            .select(T::COLLECTION, &query, predicate)
            .await;
        self.session
            .merge(T::COLLECTION, rows, predicate)
            .into_iter()
            .map(codec::from_document)
            .collect()
    }
}

impl<T> Clone for SessionRepository<T> {
    fn clone(&self) -> Self {
        Self {
            session: self.session.clone(),
            _entity: PhantomData,
        }
    }
}

impl<T: Entity> std::fmt::Debug for SessionRepository<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRepository")
            .field("table", &T::COLLECTION)
            .field("session", &self.session)
            .finish()
    }
}

#[async_trait]
impl<T: Entity> Repository<T> for SessionRepository<T> {
    fn find_capability(&self) -> FindCapability {
        FindCapability::PushDown
    }

    fn write_semantics(&self) -> WriteSemantics {
        WriteSemantics {
            add: AddSemantics::Reject,
            update: UpdateSemantics::RequireExisting,
        }
    }

    fn explain(&self, predicate: &Predicate) -> QueryPlan {
        QueryPlan::PushDown {
            native: translate::select(T::COLLECTION, predicate).text,
        }
    }

    async fn get_by_id(&self, id: EntityId) -> RepoResult<Option<T>> {
        match self.session.staged(T::COLLECTION, id) {
            Some(
                Change::Insert { doc } | Change::Update { doc, .. } | Change::Replace { doc, .. },
            ) => return codec::from_document(doc).map(Some),
            Some(Change::Delete { .. }) => return Ok(None),
            None => {}
        }
        match self.session.store().fetch(T::COLLECTION, id).await {
            Some(row) => {
                self.session.observe(T::COLLECTION, id, row.version);
                codec::from_document(row.doc).map(Some)
            }
            None => Ok(None),
        }
    }

    async fn get_all(&self) -> RepoResult<Vec<T>> {
        self.query(&Predicate::Always).await
    }

    async fn add(&self, entity: T) -> RepoResult<()> {
        let id = codec::identify(&entity)?;
        let doc = codec::to_document(&entity)?;
        self.session.stage_add::<T>(id, doc)?;
        tracing::debug!(table = T::COLLECTION, %id, "staged insert");
        Ok(())
    }

    async fn update(&self, entity: T) -> RepoResult<()> {
        let id = codec::identify(&entity)?;
        let doc = codec::to_document(&entity)?;
        self.session.stage_update::<T>(id, doc)?;
        tracing::debug!(table = T::COLLECTION, %id, "staged update");
        Ok(())
    }

    async fn delete(&self, id: EntityId) -> RepoResult<()> {
        self.session.stage_delete::<T>(id);
        tracing::debug!(table = T::COLLECTION, %id, "staged delete");
        Ok(())
    }

    async fn find(&self, predicate: &Predicate) -> RepoResult<Vec<T>> {
        self.query(predicate).await
    }
}
