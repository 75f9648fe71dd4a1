//! Relational backend for Depot repositories.
//!
//! [`RelationalStore`] keeps one table per entity collection; each row holds
//! the entity as a JSON document plus a row version. Access goes through a
//! [`Session`], which is both the change tracker and the
//! [`UnitOfWork`](depot_repo::UnitOfWork):
//!
//! ```no_run
//! # use depot_relational::RelationalStore;
//! # use depot_repo::{CancellationToken, Repository, UnitOfWork};
//! # async fn demo<T: depot_types::Entity>(entity: T) -> depot_repo::RepoResult<()> {
//! let store = RelationalStore::new();
//! let session = store.session();
//! session.repository::<T>().add(entity).await?;
//! session.save_changes(&CancellationToken::new()).await?;
//! # Ok(())
//! # }
//! ```
//!
//! Backend properties:
//!
//! - `find` is translated to SQL ([`translate`]) and evaluated inside the store.
//! - Duplicate `add` fails with `AlreadyExists`; `update` of a missing or
//!   concurrently modified row fails with `Concurrency`. Both surface at commit.
//! - `save_changes` is atomic.

pub mod repository;
pub mod session;
pub mod store;
pub mod translate;

pub use repository::SessionRepository;
pub use session::Session;
pub use store::{RelationalStore, Row};
pub use translate::SqlQuery;
