//! In-process key-value tables.
//!
//! A [`KeyValueTable`] behaves like a document table in a managed key-value
//! service: items are opaque serialized blobs addressed by identifier, point
//! reads and writes are single operations, and the only way to look at more
//! than one item is a paginated scan. There is no query language and no
//! multi-item transaction.

use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use bytes::Bytes;
use depot_repo::{RepoError, RepoResult};
use depot_types::EntityId;
use serde::{Deserialize, Serialize};

/// Configuration for key-value tables.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyValueConfig {
    /// Maximum number of items returned by one scan request.
    pub scan_page_size: usize,
}

impl Default for KeyValueConfig {
    fn default() -> Self {
        Self { scan_page_size: 100 }
    }
}

/// One page of a table scan.
#[derive(Clone, Debug, Default)]
pub struct ScanPage {
    pub items: Vec<(EntityId, Bytes)>,
    /// Pass back as `start_after` to continue; `None` when the scan is done.
    pub last_evaluated: Option<EntityId>,
}

/// Operation counters, for observing access patterns.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TableStats {
    pub point_reads: u64,
    pub writes: u64,
    pub deletes: u64,
    pub scan_requests: u64,
    pub items_scanned: u64,
}

#[derive(Default)]
struct Counters {
    point_reads: AtomicU64,
    writes: AtomicU64,
    deletes: AtomicU64,
    scan_requests: AtomicU64,
    items_scanned: AtomicU64,
}

/// A single key-value table. Writes are last-writer-wins.
pub struct KeyValueTable {
    name: String,
    page_size: usize,
    items: RwLock<BTreeMap<EntityId, Bytes>>,
    unavailable: AtomicBool,
    counters: Counters,
}

impl KeyValueTable {
    pub fn new(name: impl Into<String>, config: &KeyValueConfig) -> Self {
        Self {
            name: name.into(),
            page_size: config.scan_page_size.max(1),
            items: RwLock::new(BTreeMap::new()),
            unavailable: AtomicBool::new(false),
            counters: Counters::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Number of items currently stored.
    pub fn len(&self) -> usize {
        self.items.read().expect("lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> TableStats {
        let c = &self.counters;
        TableStats {
            point_reads: c.point_reads.load(Ordering::Relaxed),
            writes: c.writes.load(Ordering::Relaxed),
            deletes: c.deletes.load(Ordering::Relaxed),
            scan_requests: c.scan_requests.load(Ordering::Relaxed),
            items_scanned: c.items_scanned.load(Ordering::Relaxed),
        }
    }

    /// Make every request fail with a storage error until switched back.
    ///
    /// Simulates an outage so callers can exercise fault propagation.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self, op: &str) -> RepoResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(RepoError::Storage(format!(
                "table {} unavailable during {op}",
                self.name
            )));
        }
        Ok(())
    }

    fn poisoned(&self, e: impl std::fmt::Display) -> RepoError {
        RepoError::Storage(format!("table {} lock poisoned: {e}", self.name))
    }

    pub async fn get_item(&self, id: EntityId) -> RepoResult<Option<Bytes>> {
        self.check_available("get_item")?;
        self.counters.point_reads.fetch_add(1, Ordering::Relaxed);
        let items = self.items.read().map_err(|e| self.poisoned(e))?;
        Ok(items.get(&id).cloned())
    }

    pub async fn put_item(&self, id: EntityId, item: Bytes) -> RepoResult<()> {
        self.check_available("put_item")?;
        self.counters.writes.fetch_add(1, Ordering::Relaxed);
        let mut items = self.items.write().map_err(|e| self.poisoned(e))?;
        items.insert(id, item);
        Ok(())
    }

    /// Returns `true` if the item existed.
    pub async fn delete_item(&self, id: EntityId) -> RepoResult<bool> {
        self.check_available("delete_item")?;
        self.counters.deletes.fetch_add(1, Ordering::Relaxed);
        let mut items = self.items.write().map_err(|e| self.poisoned(e))?;
        Ok(items.remove(&id).is_some())
    }

    /// Read up to one page of items after `start_after`, in identifier order.
    pub async fn scan(&self, start_after: Option<EntityId>) -> RepoResult<ScanPage> {
        self.check_available("scan")?;
        self.counters.scan_requests.fetch_add(1, Ordering::Relaxed);
        let items = self.items.read().map_err(|e| self.poisoned(e))?;

        let lower = match start_after {
            Some(id) => Bound::Excluded(id),
            None => Bound::Unbounded,
        };
        let page: Vec<(EntityId, Bytes)> = items
            .range((lower, Bound::Unbounded))
            .take(self.page_size)
            .map(|(id, item)| (*id, item.clone()))
            .collect();

        let last_evaluated = match page.last() {
            Some((last, _)) if page.len() == self.page_size => items
                .range((Bound::Excluded(*last), Bound::Unbounded))
                .next()
                .map(|_| *last),
            _ => None,
        };
        self.counters
            .items_scanned
            .fetch_add(page.len() as u64, Ordering::Relaxed);
        Ok(ScanPage {
            items: page,
            last_evaluated,
        })
    }

    /// Follow scan pages to the end of the table.
    pub async fn scan_all(&self) -> RepoResult<Vec<(EntityId, Bytes)>> {
        let mut out = Vec::new();
        let mut cursor = None;
        loop {
            let page = self.scan(cursor).await?;
            out.extend(page.items);
            match page.last_evaluated {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }
        tracing::debug!(table = %self.name, items = out.len(), "full table scan");
        Ok(out)
    }
}

impl std::fmt::Debug for KeyValueTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyValueTable")
            .field("name", &self.name)
            .field("item_count", &self.len())
            .finish()
    }
}

/// A set of named tables sharing one configuration.
#[derive(Debug, Default)]
pub struct KeyValueStore {
    config: KeyValueConfig,
    tables: RwLock<HashMap<String, Arc<KeyValueTable>>>,
}

impl KeyValueStore {
    pub fn new(config: KeyValueConfig) -> Self {
        Self {
            config,
            tables: RwLock::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &KeyValueConfig {
        &self.config
    }

    /// The table called `name`, created empty on first use.
    pub fn table(&self, name: &str) -> Arc<KeyValueTable> {
        if let Some(table) = self.tables.read().expect("lock poisoned").get(name) {
            return Arc::clone(table);
        }
        let mut tables = self.tables.write().expect("lock poisoned");
        Arc::clone(
            tables
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(KeyValueTable::new(name, &self.config))),
        )
    }

    /// Names of all tables created so far, sorted.
    pub fn table_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .tables
            .read()
            .expect("lock poisoned")
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }
}
