//! Blob storage for Depot.
//!
//! A blob is an opaque named byte sequence. This crate defines the
//! [`BlobStore`] contract every object-store backend satisfies, plus two
//! in-process backends. Structured adapters (`depot-data`) layer JSON and
//! CSV on top of this contract without knowing which backend is below.
//!
//! # Storage Backends
//!
//! All backends implement the [`BlobStore`] trait:
//!
//! - [`InMemoryBlobStore`] -- map-based store for tests and embedding
//! - [`FsBlobStore`] -- one file per key under a root directory
//!
//! # Design Rules
//!
//! 1. Upload always overwrites; there is no append or partial write.
//! 2. A missing key downloads as `None`, never as an error.
//! 3. Delete is idempotent.
//! 4. The store never interprets blob contents.
//! 5. All backend errors are propagated, never retried or ignored.

pub mod error;
pub mod fs;
pub mod memory;
pub mod traits;

pub use error::{BlobError, BlobResult};
pub use fs::{FsBlobStore, FsBlobStoreConfig};
pub use memory::InMemoryBlobStore;
pub use traits::BlobStore;
