//! Key-value backend for Depot repositories.
//!
//! Entities are stored as serialized items in a [`KeyValueTable`], one table
//! per entity collection. The backend has point reads and writes and a
//! paginated scan; nothing else.
//!
//! What that means for callers:
//!
//! - [`KeyValueRepository::find`] reads every page of the table and filters
//!   client-side ([`FindCapability::FullScan`](depot_repo::FindCapability)).
//! - `add` overwrites an existing item and `update` inserts a missing one.
//! - Writes apply immediately; [`KeyValueUnitOfWork::save_changes`] commits
//!   nothing and returns 0.

pub mod repository;
pub mod table;
pub mod unit_of_work;

pub use repository::KeyValueRepository;
pub use table::{KeyValueConfig, KeyValueStore, KeyValueTable, ScanPage, TableStats};
pub use unit_of_work::KeyValueUnitOfWork;
