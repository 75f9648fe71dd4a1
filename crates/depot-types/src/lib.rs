//! Foundation types for Depot.
//!
//! This crate provides the identity, key, and query types shared by every
//! Depot contract and backend. Every other Depot crate depends on
//! `depot-types`.
//!
//! # Key Types
//!
//! - [`EntityId`] -- UUID v7 identifier, the only key for point lookups
//! - [`Entity`] -- Trait for anything a repository can persist
//! - [`BlobKey`] -- Validated name of a byte-stream resource
//! - [`Predicate`] -- Backend-independent filter expression over entity fields
//! - [`FaultKind`] -- Classification shared by every Depot error type

pub mod entity;
pub mod error;
pub mod fault;
pub mod key;
pub mod predicate;

pub use entity::{Entity, EntityId};
pub use error::TypeError;
pub use fault::FaultKind;
pub use key::BlobKey;
pub use predicate::{Comparison, Field, Predicate};
