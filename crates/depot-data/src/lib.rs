//! Structured-data adapters for Depot.
//!
//! Adapters convert typed values to bytes and hand complete buffers to a
//! [`BlobStore`](depot_blob::BlobStore); they never stream partial writes.
//! Reads reverse the process and keep "absent" separate from "unparsable".
//!
//! - [`JsonAdapter`] -- one document per key, nested structure preserved
//! - [`CsvAdapter`] -- one homogeneous record collection per key
//!
//! ```no_run
//! # async fn demo() -> depot_data::DataResult<()> {
//! use std::sync::Arc;
//! use depot_blob::InMemoryBlobStore;
//! use depot_data::JsonAdapter;
//! use depot_types::BlobKey;
//! use serde_json::json;
//!
//! let json = JsonAdapter::new(Arc::new(InMemoryBlobStore::new()));
//! let key = BlobKey::new("users/1.json").expect("valid key");
//! json.upload_json(&key, &json!({"name": "Ana", "age": 30})).await?;
//! let back: Option<serde_json::Value> = json.download_json(&key).await?;
//! assert_eq!(back, Some(json!({"name": "Ana", "age": 30})));
//! # Ok(())
//! # }
//! ```

pub mod delimited;
pub mod error;
pub mod json;

pub use delimited::{CsvAdapter, CsvOptions};
pub use error::{DataError, DataResult};
pub use json::{JsonAdapter, JsonOptions};
