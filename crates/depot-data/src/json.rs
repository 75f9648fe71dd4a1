use std::sync::Arc;

use bytes::Bytes;
use depot_blob::BlobStore;
use depot_types::BlobKey;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{DataError, DataResult};

/// Encoding options for [`JsonAdapter`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JsonOptions {
    /// Indent the stored document.
    pub pretty: bool,
}

/// Stores single JSON documents through a [`BlobStore`].
///
/// Nested structure is preserved. Unknown fields in a stored document are
/// ignored on read unless the target type opts into
/// `#[serde(deny_unknown_fields)]`.
#[derive(Clone)]
pub struct JsonAdapter {
    store: Arc<dyn BlobStore>,
    options: JsonOptions,
}

impl JsonAdapter {
    pub fn new(store: Arc<dyn BlobStore>) -> Self {
        Self::with_options(store, JsonOptions::default())
    }

    pub fn with_options(store: Arc<dyn BlobStore>, options: JsonOptions) -> Self {
        Self { store, options }
    }

    pub fn options(&self) -> &JsonOptions {
        &self.options
    }

    /// Encode `value` without touching the store.
    pub fn encode<T: Serialize + ?Sized>(&self, key: &BlobKey, value: &T) -> DataResult<Vec<u8>> {
        let encoded = if self.options.pretty {
            serde_json::to_vec_pretty(value)
        } else {
            serde_json::to_vec(value)
        };
        encoded.map_err(|e| DataError::Serialization {
            key: key.to_string(),
            reason: e.to_string(),
        })
    }

    /// Decode a stored document.
    pub fn decode<T: DeserializeOwned>(&self, key: &BlobKey, bytes: &[u8]) -> DataResult<T> {
        serde_json::from_slice(bytes).map_err(|e| DataError::Deserialization {
            key: key.to_string(),
            reason: e.to_string(),
        })
    }

    /// Serialize `value` fully in memory, then upload it under `key`.
    ///
    /// Nothing is uploaded if serialization fails.
    pub async fn upload_json<T: Serialize + ?Sized>(
        &self,
        key: &BlobKey,
        value: &T,
    ) -> DataResult<()> {
        let encoded = self.encode(key, value)?;
        tracing::debug!(%key, bytes = encoded.len(), "upload json");
        self.store.upload(key, Bytes::from(encoded)).await?;
        Ok(())
    }

    /// Download and decode the document under `key`.
    ///
    /// Returns `Ok(None)` when the blob does not exist; parsing is not
    /// attempted in that case.
    pub async fn download_json<T: DeserializeOwned>(&self, key: &BlobKey) -> DataResult<Option<T>> {
        match self.store.download(key).await? {
            Some(bytes) => self.decode(key, &bytes).map(Some),
            None => {
                tracing::debug!(%key, "json blob absent");
                Ok(None)
            }
        }
    }
}

impl std::fmt::Debug for JsonAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonAdapter")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use depot_blob::InMemoryBlobStore;
    use depot_types::FaultKind;
    use serde_json::json;

    use super::*;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct User {
        name: String,
        age: u32,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Team {
        title: String,
        lead: User,
        members: Vec<User>,
        labels: BTreeMap<String, String>,
    }

    fn key(s: &str) -> BlobKey {
        BlobKey::new(s).unwrap()
    }

    fn adapter() -> (Arc<InMemoryBlobStore>, JsonAdapter) {
        let store = Arc::new(InMemoryBlobStore::new());
        let adapter = JsonAdapter::new(store.clone());
        (store, adapter)
    }

    #[tokio::test]
    async fn user_document_roundtrips() {
        let (_store, adapter) = adapter();
        let ana = User { name: "Ana".into(), age: 30 };
        adapter.upload_json(&key("users/1.json"), &ana).await.unwrap();

        let read: User = adapter.download_json(&key("users/1.json")).await.unwrap().unwrap();
        assert_eq!(read, ana);

        let raw: serde_json::Value =
            adapter.download_json(&key("users/1.json")).await.unwrap().unwrap();
        assert_eq!(raw, json!({"name": "Ana", "age": 30}));
    }

    #[tokio::test]
    async fn nested_structure_is_preserved() {
        let (_store, adapter) = adapter();
        let team = Team {
            title: "core".into(),
            lead: User { name: "Ana".into(), age: 30 },
            members: vec![User { name: "Bo".into(), age: 41 }],
            labels: BTreeMap::from([("tier".to_string(), "gold".to_string())]),
        };
        adapter.upload_json(&key("teams/core.json"), &team).await.unwrap();
        let read: Team = adapter.download_json(&key("teams/core.json")).await.unwrap().unwrap();
        assert_eq!(read, team);
    }

    #[tokio::test]
    async fn unknown_fields_are_ignored_on_read() {
        let (store, adapter) = adapter();
        store
            .upload(
                &key("users/2.json"),
                Bytes::from_static(br#"{"name":"Bo","age":41,"email":"bo@example.com"}"#),
            )
            .await
            .unwrap();

        let read: User = adapter.download_json(&key("users/2.json")).await.unwrap().unwrap();
        assert_eq!(read, User { name: "Bo".into(), age: 41 });
    }

    #[tokio::test]
    async fn absent_blob_is_none() {
        let (_store, adapter) = adapter();
        let read: Option<User> = adapter.download_json(&key("users/404.json")).await.unwrap();
        assert!(read.is_none());
    }

    #[tokio::test]
    async fn malformed_document_is_a_deserialization_fault() {
        let (store, adapter) = adapter();
        store
            .upload(&key("broken.json"), Bytes::from_static(b"{\"name\": "))
            .await
            .unwrap();

        let err = adapter.download_json::<User>(&key("broken.json")).await.unwrap_err();
        assert_eq!(err.kind(), FaultKind::Deserialization);
    }

    #[tokio::test]
    async fn type_mismatch_is_a_deserialization_fault() {
        let (store, adapter) = adapter();
        store
            .upload(&key("u.json"), Bytes::from_static(br#"{"name":"Ana","age":"thirty"}"#))
            .await
            .unwrap();
        let err = adapter.download_json::<User>(&key("u.json")).await.unwrap_err();
        assert!(matches!(err, DataError::Deserialization { .. }));
    }

    #[tokio::test]
    async fn unserializable_value_aborts_before_upload() {
        let (store, adapter) = adapter();
        // JSON object keys must be strings.
        let bad: BTreeMap<Vec<u8>, u8> = BTreeMap::from([(vec![1, 2], 3)]);

        let err = adapter.upload_json(&key("bad.json"), &bad).await.unwrap_err();
        assert_eq!(err.kind(), FaultKind::Serialization);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn pretty_option_indents_output() {
        let store = Arc::new(InMemoryBlobStore::new());
        let adapter = JsonAdapter::with_options(store.clone(), JsonOptions { pretty: true });
        adapter
            .upload_json(&key("p.json"), &User { name: "Ana".into(), age: 30 })
            .await
            .unwrap();

        let raw = store.download(&key("p.json")).await.unwrap().unwrap();
        assert!(raw.contains(&b'\n'));
        let read: User = adapter.download_json(&key("p.json")).await.unwrap().unwrap();
        assert_eq!(read.age, 30);
    }
}
