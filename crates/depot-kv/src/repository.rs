//! [`Repository`] over a key-value table.

use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use depot_repo::codec;
use depot_repo::{
    AddSemantics, FindCapability, QueryPlan, RepoResult, Repository, UpdateSemantics,
    WriteSemantics,
};
use depot_types::{Entity, EntityId, Predicate};
use serde_json::Value;

use crate::table::{KeyValueStore, KeyValueTable};

/// Repository for entities of type `T`, stored one item per entity in the
/// table named after `T::COLLECTION`.
///
/// Every write goes straight to the table. `add` and `update` are both a
/// single unconditional put, so duplicates overwrite and updates upsert.
/// `find` has no native query to translate into and reads the table in full.
pub struct KeyValueRepository<T> {
    table: Arc<KeyValueTable>,
    _entity: PhantomData<fn() -> T>,
}

impl<T: Entity> KeyValueRepository<T> {
    pub fn new(store: &KeyValueStore) -> Self {
        Self::with_table(store.table(T::COLLECTION))
    }

    pub fn with_table(table: Arc<KeyValueTable>) -> Self {
        Self {
            table,
            _entity: PhantomData,
        }
    }

    pub fn table(&self) -> &Arc<KeyValueTable> {
        &self.table
    }

    async fn put(&self, entity: &T) -> RepoResult<EntityId> {
        let id = codec::identify(entity)?;
        let bytes = codec::to_bytes(entity)?;
        self.table.put_item(id, Bytes::from(bytes)).await?;
        Ok(id)
    }

    async fn scan_documents(&self) -> RepoResult<Vec<Value>> {
        self.table
            .scan_all()
            .await?
            .into_iter()
            .map(|(_, item)| {
                serde_json::from_slice(&item).map_err(|e| depot_repo::RepoError::Deserialization {
                    collection: T::COLLECTION.to_string(),
                    reason: e.to_string(),
                })
            })
            .collect()
    }
}

impl<T> std::fmt::Debug for KeyValueRepository<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyValueRepository")
            .field("table", &self.table.name())
            .finish()
    }
}

#[async_trait]
impl<T: Entity> Repository<T> for KeyValueRepository<T> {
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
            extent: self.table.name().to_string(),
            filter: predicate.to_string(),
        }
    }

    async fn get_by_id(&self, id: EntityId) -> RepoResult<Option<T>> {
        match self.table.get_item(id).await? {
            Some(item) => codec::from_bytes(&item).map(Some),
            None => Ok(None),
        }
    }

    async fn get_all(&self) -> RepoResult<Vec<T>> {
        self.table
            .scan_all()
            .await?
            .into_iter()
            .map(|(_, item)| codec::from_bytes(&item))
            .collect()
    }

    async fn add(&self, entity: T) -> RepoResult<()> {
        let id = self.put(&entity).await?;
        tracing::debug!(table = %self.table.name(), %id, "put item (add)");
        Ok(())
    }

    async fn update(&self, entity: T) -> RepoResult<()> {
        let id = self.put(&entity).await?;
        tracing::debug!(table = %self.table.name(), %id, "put item (update)");
        Ok(())
    }

    async fn delete(&self, id: EntityId) -> RepoResult<()> {
        if self.table.get_item(id).await?.is_none() {
            tracing::debug!(table = %self.table.name(), %id, "delete of missing item");
            return Ok(());
        }
        self.table.delete_item(id).await?;
        tracing::debug!(table = %self.table.name(), %id, "delete item");
        Ok(())
    }

    async fn find(&self, predicate: &Predicate) -> RepoResult<Vec<T>> {
        tracing::debug!(plan = %self.explain(predicate), "find");
        let docs = self.scan_documents().await?;
        let scanned = docs.len();
        let found: Vec<T> = codec::filter_documents(docs, predicate)?;
        if scanned > 0 {
            tracing::debug!(
                table = %self.table.name(),
                scanned,
                matched = found.len(),
                "client-side filter"
            );
        }
        Ok(found)
    }
}
