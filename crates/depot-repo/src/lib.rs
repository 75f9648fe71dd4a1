//! Repository and unit-of-work contracts for Depot.
//!
//! This crate defines the seams application code talks to; backends live in
//! their own crates and plug in behind these traits.
//!
//! # Modules
//!
//! - [`traits`] -- [`Repository`] (generic over the entity type) and [`UnitOfWork`]
//! - [`capability`] -- declared backend properties: find push-down, write and commit semantics
//! - [`cancel`] -- [`CancellationToken`] for cooperative commit cancellation
//! - [`codec`] -- entity/document conversion and client-side filtering shared by backends
//! - [`error`] -- [`RepoError`] and its [`FaultKind`](depot_types::FaultKind) classification
//!
//! # Backend differences are part of the contract
//!
//! Two repositories can return identical results with very different costs
//! and guarantees. [`Repository::find_capability`],
//! [`Repository::write_semantics`] and [`UnitOfWork::commit_semantics`]
//! declare those differences so callers can rely on them.

pub mod cancel;
pub mod capability;
pub mod codec;
pub mod error;
pub mod traits;

pub use cancel::CancellationToken;
pub use capability::{
    AddSemantics, CommitSemantics, FindCapability, QueryPlan, UpdateSemantics, WriteSemantics,
};
pub use error::{RepoError, RepoResult};
pub use traits::{Repository, UnitOfWork};
