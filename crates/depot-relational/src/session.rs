//! Sessions: the relational unit of work.
//!
//! A [`Session`] tracks every `add`, `update` and `delete` issued through
//! its repositories and applies them in one batch on
//! [`save_changes`](UnitOfWork::save_changes). Until then nothing reaches
//! the store; reads through the session see its own staged changes.
//!
//! Optimistic concurrency: the session remembers the version of each row
//! it reads. At commit an update or delete of a row whose version has moved
//! since is a [`RepoError::Concurrency`], and the whole batch is rejected.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use depot_repo::{CancellationToken, CommitSemantics, RepoError, RepoResult, UnitOfWork};
use depot_types::{Entity, EntityId, Predicate};
use serde_json::Value;

use crate::repository::SessionRepository;
use crate::store::{RelationalStore, Row, Tables};

/// A pending mutation of one row.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Change {
    Insert { doc: Value },
    /// `expected` is the version this session read, if it read the row.
    Update { doc: Value, expected: Option<u64> },
    /// Re-add after a delete in the same session. Writes the row whether or
    /// not it exists in the store.
    Replace { doc: Value, expected: Option<u64> },
    Delete { expected: Option<u64> },
}

type RowKey = (String, EntityId);

#[derive(Debug, Default)]
pub(crate) struct Tracker {
    changes: BTreeMap<RowKey, Change>,
    loaded: HashMap<RowKey, u64>,
}

pub(crate) struct SessionState {
    store: Arc<RelationalStore>,
    tracker: Mutex<Tracker>,
}

impl Drop for SessionState {
    fn drop(&mut self) {
        let pending = self
            .tracker
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .changes
            .len();
        if pending > 0 {
            tracing::warn!(pending, "session dropped with uncommitted changes; discarding");
        }
    }
}

/// Unit-of-work scope over a [`RelationalStore`].
///
/// Clones share one change tracker. When the last clone (including those
/// held by repositories) is dropped, uncommitted changes are discarded.
#[derive(Clone)]
pub struct Session {
    state: Arc<SessionState>,
}

impl Session {
    pub(crate) fn new(store: Arc<RelationalStore>) -> Self {
        Self {
            state: Arc::new(SessionState {
                store,
                tracker: Mutex::new(Tracker::default()),
            }),
        }
    }

    pub fn store(&self) -> &Arc<RelationalStore> {
        &self.state.store
    }

    /// A repository for `T` whose writes are staged in this session.
    pub fn repository<T: Entity>(&self) -> SessionRepository<T> {
        SessionRepository::new(self.clone())
    }

    /// Drop all pending changes without committing. Returns how many there were.
    pub fn discard_changes(&self) -> usize {
        let mut tracker = self.tracker();
        let discarded = tracker.changes.len();
        tracker.changes.clear();
        if discarded > 0 {
            tracing::debug!(discarded, "discarded pending changes");
        }
        discarded
    }

    fn tracker(&self) -> MutexGuard<'_, Tracker> {
        self.state
            .tracker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Remember the version of a row as first read by this session.
    pub(crate) fn observe(&self, table: &str, id: EntityId, version: u64) {
        self.tracker()
            .loaded
            .entry((table.to_string(), id))
            .or_insert(version);
    }

    pub(crate) fn staged(&self, table: &str, id: EntityId) -> Option<Change> {
        self.tracker().changes.get(&(table.to_string(), id)).cloned()
    }

    pub(crate) fn stage_add<T: Entity>(&self, id: EntityId, doc: Value) -> RepoResult<()> {
        let key = (T::COLLECTION.to_string(), id);
        let mut tracker = self.tracker();
        let change = match tracker.changes.get(&key) {
            Some(Change::Insert { .. } | Change::Update { .. } | Change::Replace { .. }) => {
                return Err(RepoError::AlreadyExists {
                    collection: T::COLLECTION.to_string(),
                    id,
                })
            }
            Some(Change::Delete { expected }) => Change::Replace {
                doc,
                expected: *expected,
            },
            None => Change::Insert { doc },
        };
        tracker.changes.insert(key, change);
        Ok(())
    }

    pub(crate) fn stage_update<T: Entity>(&self, id: EntityId, doc: Value) -> RepoResult<()> {
        let key = (T::COLLECTION.to_string(), id);
        let mut tracker = self.tracker();
        let change = match tracker.changes.get(&key) {
            Some(Change::Insert { .. }) => Change::Insert { doc },
            Some(Change::Update { expected, .. }) => Change::Update {
                doc,
                expected: *expected,
            },
            Some(Change::Replace { expected, .. }) => Change::Replace {
                doc,
                expected: *expected,
            },
            Some(Change::Delete { .. }) => {
                return Err(RepoError::Concurrency {
                    collection: T::COLLECTION.to_string(),
                    id,
                    reason: "row was deleted in this session".into(),
                })
            }
            None => Change::Update {
                doc,
                expected: tracker.loaded.get(&key).copied(),
            },
        };
        tracker.changes.insert(key, change);
        Ok(())
    }

    pub(crate) fn stage_delete<T: Entity>(&self, id: EntityId) {
        let key = (T::COLLECTION.to_string(), id);
        let mut tracker = self.tracker();
        match tracker.changes.get(&key).cloned() {
            Some(Change::Insert { .. }) => {
                tracker.changes.remove(&key);
            }
            Some(Change::Update { expected, .. } | Change::Replace { expected, .. }) => {
                tracker.changes.insert(key, Change::Delete { expected });
            }
            Some(Change::Delete { .. }) => {}
            None => {
                let expected = tracker.loaded.get(&key).copied();
                tracker.changes.insert(key, Change::Delete { expected });
            }
        }
    }

    /// Combine committed rows returned by a query with this session's
    /// staged changes to `table`. Result is in identifier order.
    pub(crate) fn merge(
        &self,
        table: &str,
        rows: Vec<(EntityId, Row)>,
        predicate: &Predicate,
    ) -> Vec<Value> {
        let mut tracker = self.tracker();
        let mut docs: BTreeMap<EntityId, Value> = BTreeMap::new();
        for (id, row) in rows {
            tracker
                .loaded
                .entry((table.to_string(), id))
                .or_insert(row.version);
            docs.insert(id, row.doc);
        }
        for ((t, id), change) in &tracker.changes {
            if t != table {
                continue;
            }
            match change {
                Change::Insert { doc } | Change::Update { doc, .. } | Change::Replace { doc, .. }
                    if predicate.matches(doc) =>
                {
                    docs.insert(*id, doc.clone());
                }
                _ => {
                    docs.remove(id);
                }
            }
        }
        docs.into_values().collect()
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("pending_changes", &self.pending_changes())
            .finish()
    }
}

/// Check every change against committed state. Nothing is written.
fn validate(tables: &Tables, changes: &BTreeMap<RowKey, Change>) -> RepoResult<()> {
    for ((table, id), change) in changes {
        let row = tables.get(table).and_then(|t| t.get(id));
        let conflict = |reason: String| RepoError::Concurrency {
            collection: table.clone(),
            id: *id,
            reason,
        };
        match (change, row) {
            (Change::Insert { .. }, Some(_)) => {
                return Err(RepoError::AlreadyExists {
                    collection: table.clone(),
                    id: *id,
                })
            }
            (Change::Update { .. }, None) => {
                return Err(conflict("row does not exist".into()));
            }
            (
                Change::Update {
                    expected: Some(v), ..
                }
                | Change::Replace {
                    expected: Some(v), ..
                }
                | Change::Delete { expected: Some(v) },
                Some(row),
            ) if row.version != *v => {
                return Err(conflict(format!(
                    "row version moved from {v} to {}",
                    row.version
                )));
            }
            _ => {}
        }
    }
    Ok(())
}

/// Apply validated changes. Returns the number of rows affected.
fn apply(tables: &mut Tables, tracker: &mut Tracker) -> usize {
    let mut affected = 0;
    for ((table, id), change) in std::mem::take(&mut tracker.changes) {
        let rows = tables.entry(table.clone()).or_default();
        let key = (table, id);
        match change {
            Change::Insert { doc } => {
                rows.insert(id, Row { doc, version: 1 });
                tracker.loaded.insert(key, 1);
                affected += 1;
            }
            Change::Update { doc, .. } | Change::Replace { doc, .. } => {
                // A replace of a row that is not in the store starts at 1.
                let version = rows.get(&id).map_or(1, |row| row.version + 1);
                rows.insert(id, Row { doc, version });
                tracker.loaded.insert(key, version);
                affected += 1;
            }
            Change::Delete { .. } => {
                if rows.remove(&id).is_some() {
                    affected += 1;
                }
                tracker.loaded.remove(&key);
            }
        }
    }
    affected
}

#[async_trait]
impl UnitOfWork for Session {
    fn commit_semantics(&self) -> CommitSemantics {
        CommitSemantics::Atomic
    }

    fn pending_changes(&self) -> usize {
        self.tracker().changes.len()
    }

    async fn save_changes(&self, cancel: &CancellationToken) -> RepoResult<usize> {
        if cancel.is_cancelled() {
            return Err(RepoError::Cancelled);
        }

        let mut tables = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::debug!("commit cancelled while waiting for the store");
                return Err(RepoError::Cancelled);
            }
            guard = self.state.store.write() => guard,
        };
        if cancel.is_cancelled() {
            return Err(RepoError::Cancelled);
        }

        let mut tracker = self.tracker();
        let pending = tracker.changes.len();
        if pending == 0 {
            return Ok(0);
        }
        if let Err(e) = validate(&tables, &tracker.changes) {
            tracing::warn!(pending, error = %e, "commit rejected; no changes applied");
            return Err(e);
        }
        let affected = apply(&mut tables, &mut tracker);
        tracing::info!(pending, affected, "committed session");
        Ok(affected)
    }
}
