//! Entity <-> stored-document conversion shared by every backend.
//!
//! Backends persist the entity's serialized form. Predicates are resolved
//! against the same form, so client-side filtering and push-down agree on
//! field names.

use depot_types::{Entity, EntityId, Predicate};
use serde_json::Value;

use crate::error::{RepoError, RepoResult};

/// Check that the entity carries a usable identifier and return it.
pub fn identify<T: Entity>(entity: &T) -> RepoResult<EntityId> {
    let id = entity.id();
    if id.is_nil() {
        return Err(RepoError::InvalidEntity {
            collection: T::COLLECTION.to_string(),
            reason: "nil identifier".into(),
        });
    }
    Ok(id)
}

pub fn to_document<T: Entity>(entity: &T) -> RepoResult<Value> {
    serde_json::to_value(entity).map_err(|e| RepoError::Serialization {
        collection: T::COLLECTION.to_string(),
        reason: e.to_string(),
    })
}

pub fn from_document<T: Entity>(doc: Value) -> RepoResult<T> {
    serde_json::from_value(doc).map_err(|e| RepoError::Deserialization {
        collection: T::COLLECTION.to_string(),
        reason: e.to_string(),
    })
}

pub fn to_bytes<T: Entity>(entity: &T) -> RepoResult<Vec<u8>> {
    serde_json::to_vec(entity).map_err(|e| RepoError::Serialization {
        collection: T::COLLECTION.to_string(),
        reason: e.to_string(),
    })
}

pub fn from_bytes<T: Entity>(bytes: &[u8]) -> RepoResult<T> {
    serde_json::from_slice(bytes).map_err(|e| RepoError::Deserialization {
        collection: T::COLLECTION.to_string(),
        reason: e.to_string(),
    })
}

/// Client-side `find`: keep the documents matching `predicate`, in input
/// order, and decode them.
pub fn filter_documents<T, I>(docs: I, predicate: &Predicate) -> RepoResult<Vec<T>>
where
    T: Entity,
    I: IntoIterator<Item = Value>,
{
    docs.into_iter()
        .filter(|doc| predicate.matches(doc))
        .map(from_document)
        .collect()
}
