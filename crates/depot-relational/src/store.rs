//! The relational store: tables of versioned JSON rows.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use depot_types::{EntityId, Predicate};
use serde_json::Value;
use tokio::sync::{RwLock, RwLockWriteGuard};

use crate::session::Session;
use crate::translate::SqlQuery;

/// One stored row.
#[derive(Clone, Debug, PartialEq)]
pub struct Row {
    pub doc: Value,
    /// Starts at 1 and increases on every committed update.
    pub version: u64,
}

pub(crate) type Table = BTreeMap<EntityId, Row>;
pub(crate) type Tables = HashMap<String, Table>;

/// An in-process relational database.
///
/// Each entity collection is a table keyed by [`EntityId`] holding the
/// entity's JSON document and a row version. Queries run inside the store
/// under its read lock; commits take the write lock for the whole batch, so
/// a commit is applied entirely or not at all.
///
/// All access from repositories goes through a [`Session`].
#[derive(Debug, Default)]
pub struct RelationalStore {
    pub(crate) tables: RwLock<Tables>,
}

impl RelationalStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Open a new session (unit of work) against this store.
    pub fn session(self: &Arc<Self>) -> Session {
        Session::new(Arc::clone(self))
    }

    /// Number of committed rows in `table`.
    pub async fn row_count(&self, table: &str) -> usize {
        self.tables.read().await.get(table).map_or(0, |t| t.len())
    }

    /// Committed version of a row, if it exists.
    pub async fn row_version(&self, table: &str, id: EntityId) -> Option<u64> {
        let tables = self.tables.read().await;
        tables.get(table)?.get(&id).map(|row| row.version)
    }

    pub(crate) async fn fetch(&self, table: &str, id: EntityId) -> Option<Row> {
        let tables = self.tables.read().await;
        let row = tables.get(table)?.get(&id).cloned();
        tracing::debug!(table, %id, found = row.is_some(), "select by primary key");
        row
    }

    /// Run a translated query. The predicate is evaluated here, next to the
    /// data; only matching rows are copied out.
    pub(crate) async fn select(
        &self,
        table: &str,
        query: &SqlQuery,
        predicate: &Predicate,
    ) -> Vec<(EntityId, Row)> {
        let tables = self.tables.read().await;
        let rows: Vec<(EntityId, Row)> = tables
            .get(table)
            .map(|t| {
                t.iter()
                    .filter(|(_, row)| predicate.matches(&row.doc))
                    .map(|(id, row)| (*id, row.clone()))
                    .collect()
            })
            .unwrap_or_default();
        tracing::debug!(
            sql = %query,
            params = ?query.params,
            rows = rows.len(),
            "query executed"
        );
        rows
    }

    pub(crate) async fn write(&self) -> RwLockWriteGuard<'_, Tables> {
        self.tables.write().await
    }
}
