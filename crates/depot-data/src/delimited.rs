//! CSV collections over a [`BlobStore`].
//!
//! The header row is derived from the record type's serialized field names,
//! in declaration order. Every record in one upload must serialize to the
//! same field set; cells must be scalars.

use std::sync::Arc;

use bytes::Bytes;
use depot_blob::BlobStore;
use depot_types::BlobKey;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{DataError, DataResult};

/// Encoding options for [`CsvAdapter`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CsvOptions {
    /// Field delimiter byte. Written as a one-character string in config
    /// files (`delimiter = ";"`).
    #[serde(with = "ascii_char")]
    pub delimiter: u8,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self { delimiter: b',' }
    }
}

mod ascii_char {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(byte: &u8, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_char(char::from(*byte))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u8, D::Error> {
        let s = String::deserialize(deserializer)?;
        match s.as_bytes() {
            [b] if b.is_ascii() => Ok(*b),
            _ => Err(D::Error::custom(format!(
                "expected a single ASCII character, got {s:?}"
            ))),
        }
    }
}

/// Stores homogeneous record collections as CSV through a [`BlobStore`].
#[derive(Clone)]
pub struct CsvAdapter {
    store: Arc<dyn BlobStore>,
    options: CsvOptions,
}

impl CsvAdapter {
    pub fn new(store: Arc<dyn BlobStore>) -> Self {
        Self::with_options(store, CsvOptions::default())
    }

    pub fn with_options(store: Arc<dyn BlobStore>, options: CsvOptions) -> Self {
        Self { store, options }
    }

    pub fn options(&self) -> &CsvOptions {
        &self.options
    }

    /// Encode `records` as CSV bytes without touching the store.
    ///
    /// An empty collection encodes as an empty document (no header).
    pub fn encode<R: Serialize>(&self, key: &BlobKey, records: &[R]) -> DataResult<Vec<u8>> {
        let serialization = |reason: String| DataError::Serialization {
            key: key.to_string(),
            reason,
        };

        let rows = records
            .iter()
            .enumerate()
            .map(|(i, record)| match serde_json::to_value(record) {
                Ok(Value::Object(map)) => Ok(map),
                Ok(other) => Err(serialization(format!(
                    "record {i} is a {}, not a struct or map",
                    kind_name(&other)
                ))),
                Err(e) => Err(serialization(format!("record {i}: {e}"))),
            })
            .collect::<DataResult<Vec<Map<String, Value>>>>()?;

        let Some(first) = rows.first() else {
            return Ok(Vec::new());
        };
        let header: Vec<String> = first.keys().cloned().collect();

        let mut writer = ::csv::WriterBuilder::new()
            .delimiter(self.options.delimiter)
            .from_writer(Vec::new());
        writer
            .write_record(&header)
            .map_err(|e| serialization(e.to_string()))?;

        for (i, row) in rows.iter().enumerate() {
            check_schema(key, i, &header, row)?;
            let mut cells = Vec::with_capacity(header.len());
            for name in &header {
                // `check_schema` guarantees presence.
                let value = row.get(name).unwrap_or(&Value::Null);
                cells.push(cell(value).ok_or_else(|| {
                    serialization(format!(
                        "field {name:?} in record {i} is a nested {}; CSV cells must be scalars",
                        kind_name(value)
                    ))
                })?);
            }
            writer
                .write_record(&cells)
                .map_err(|e| serialization(e.to_string()))?;
        }

        writer
            .into_inner()
            .map_err(|e| serialization(e.to_string()))
    }

    /// Decode CSV bytes into records, in stored order.
    pub fn decode<R: DeserializeOwned>(&self, key: &BlobKey, bytes: &[u8]) -> DataResult<Vec<R>> {
        let mut reader = ::csv::ReaderBuilder::new()
            .delimiter(self.options.delimiter)
            .has_headers(true)
            .from_reader(bytes);
        reader
            .deserialize()
            .enumerate()
            .map(|(i, record)| {
                record.map_err(|e| DataError::Deserialization {
                    key: key.to_string(),
                    reason: format!("record {i}: {e}"),
                })
            })
            .collect()
    }

    /// Serialize `records` fully in memory, then upload them under `key`.
    ///
    /// Nothing is uploaded if any record fails to encode or the records do
    /// not share one field layout.
    pub async fn upload_csv<R: Serialize>(&self, key: &BlobKey, records: &[R]) -> DataResult<()> {
        let encoded = self.encode(key, records)?;
        tracing::debug!(%key, records = records.len(), bytes = encoded.len(), "upload csv");
        self.store.upload(key, Bytes::from(encoded)).await?;
        Ok(())
    }

    /// Download and decode the collection under `key`.
    ///
    /// Returns `Ok(None)` when the blob does not exist.
    pub async fn download_csv<R: DeserializeOwned>(
        &self,
        key: &BlobKey,
    ) -> DataResult<Option<Vec<R>>> {
        match self.store.download(key).await? {
            Some(bytes) => self.decode(key, &bytes).map(Some),
            None => {
                tracing::debug!(%key, "csv blob absent");
                Ok(None)
            }
        }
    }
}

impl std::fmt::Debug for CsvAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CsvAdapter")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

fn check_schema(
    key: &BlobKey,
    record: usize,
    header: &[String],
    row: &Map<String, Value>,
) -> DataResult<()> {
    let same = row.len() == header.len() && header.iter().all(|h| row.contains_key(h));
    if same {
        return Ok(());
    }
    Err(DataError::SchemaMismatch {
        key: key.to_string(),
        record,
        expected: header.to_vec(),
        found: row.keys().cloned().collect(),
    })
}

/// Render a scalar as a CSV cell. `None` for arrays and objects.
fn cell(value: &Value) -> Option<String> {
    match value {
        Value::Null => Some(String::new()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) => Some(s.clone()),
        Value::Array(_) | Value::Object(_) => None,
    }
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use depot_blob::InMemoryBlobStore;
    use depot_types::FaultKind;

    use super::*;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    enum Status {
        Active,
        Suspended,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Account {
        id: u64,
        owner: String,
        balance: f64,
        verified: bool,
        status: Status,
        note: Option<String>,
    }

    fn key(s: &str) -> BlobKey {
        BlobKey::new(s).unwrap()
    }

    fn adapter() -> (Arc<InMemoryBlobStore>, CsvAdapter) {
        let store = Arc::new(InMemoryBlobStore::new());
        let adapter = CsvAdapter::new(store.clone());
        (store, adapter)
    }

    fn accounts() -> Vec<Account> {
        vec![
            Account {
                id: 1,
                owner: "Ana".into(),
                balance: 10.5,
                verified: true,
                status: Status::Active,
                note: Some("vip, early adopter".into()),
            },
            Account {
                id: 2,
                owner: "Bo \"the builder\"".into(),
                balance: -3.0,
                verified: false,
                status: Status::Suspended,
                note: None,
            },
            Account {
                id: 3,
                owner: "Cy".into(),
                balance: 0.0,
                verified: true,
                status: Status::Active,
                note: Some("line\nbreak".into()),
            },
        ]
    }

    #[tokio::test]
    async fn records_roundtrip_in_order() {
        let (_store, adapter) = adapter();
        let original = accounts();
        adapter.upload_csv(&key("accounts.csv"), &original).await.unwrap();

        let read: Vec<Account> =
            adapter.download_csv(&key("accounts.csv")).await.unwrap().unwrap();
        assert_eq!(read, original);
    }

    #[tokio::test]
    async fn header_follows_declaration_order() {
        let (store, adapter) = adapter();
        adapter.upload_csv(&key("a.csv"), &accounts()[..1]).await.unwrap();

        let raw = store.download(&key("a.csv")).await.unwrap().unwrap();
        let text = std::str::from_utf8(&raw).unwrap();
        assert!(text.starts_with("id,owner,balance,verified,status,note\n"));
    }

    #[tokio::test]
    async fn empty_collection_roundtrips() {
        let (store, adapter) = adapter();
        adapter.upload_csv::<Account>(&key("none.csv"), &[]).await.unwrap();
        assert_eq!(store.total_bytes(), 0);

        let read: Vec<Account> = adapter.download_csv(&key("none.csv")).await.unwrap().unwrap();
        assert!(read.is_empty());
    }

    #[tokio::test]
    async fn absent_blob_is_none() {
        let (_store, adapter) = adapter();
        let read: Option<Vec<Account>> = adapter.download_csv(&key("nope.csv")).await.unwrap();
        assert!(read.is_none());
    }

    #[tokio::test]
    async fn heterogeneous_records_are_a_schema_mismatch() {
        let (store, adapter) = adapter();
        let rows = vec![
            HashMap::from([("a".to_string(), 1), ("b".to_string(), 2)]),
            HashMap::from([("b".to_string(), 3), ("a".to_string(), 4)]),
            HashMap::from([("a".to_string(), 5), ("c".to_string(), 6)]),
        ];

        let err = adapter.upload_csv(&key("mixed.csv"), &rows).await.unwrap_err();
        assert_eq!(err.kind(), FaultKind::SchemaMismatch);
        match err {
            DataError::SchemaMismatch { record, .. } => assert_eq!(record, 2),
            other => panic!("expected schema mismatch, got {other}"),
        }
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn skipped_optional_field_changes_the_schema() {
        #[derive(Serialize)]
        struct Sparse {
            a: u8,
            #[serde(skip_serializing_if = "Option::is_none")]
            b: Option<u8>,
        }
        let (_store, adapter) = adapter();
        let rows = vec![Sparse { a: 1, b: Some(2) }, Sparse { a: 3, b: None }];
        let err = adapter.upload_csv(&key("sparse.csv"), &rows).await.unwrap_err();
        assert!(matches!(err, DataError::SchemaMismatch { record: 1, .. }));
    }

    #[tokio::test]
    async fn nested_fields_are_a_serialization_fault() {
        #[derive(Serialize)]
        struct WithTags {
            name: String,
            tags: Vec<String>,
        }
        let (store, adapter) = adapter();
        let rows = vec![WithTags { name: "x".into(), tags: vec!["a".into()] }];
        let err = adapter.upload_csv(&key("tags.csv"), &rows).await.unwrap_err();
        assert_eq!(err.kind(), FaultKind::Serialization);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn non_record_values_are_a_serialization_fault() {
        let (_store, adapter) = adapter();
        let err = adapter.upload_csv(&key("n.csv"), &[1u32, 2, 3]).await.unwrap_err();
        assert!(matches!(err, DataError::Serialization { .. }));
    }

    #[tokio::test]
    async fn unparsable_cell_is_a_deserialization_fault() {
        let (store, adapter) = adapter();
        store
            .upload(&key("bad.csv"), Bytes::from_static(b"id,owner\nnot-a-number,Ana\n"))
            .await
            .unwrap();

        #[derive(Debug, Deserialize)]
        #[allow(dead_code)]
        struct Row {
            id: u64,
            owner: String,
        }
        let err = adapter.download_csv::<Row>(&key("bad.csv")).await.unwrap_err();
        assert_eq!(err.kind(), FaultKind::Deserialization);
    }

    #[tokio::test]
    async fn custom_delimiter_roundtrips() {
        let store = Arc::new(InMemoryBlobStore::new());
        let adapter = CsvAdapter::with_options(store.clone(), CsvOptions { delimiter: b';' });
        adapter.upload_csv(&key("semi.csv"), &accounts()).await.unwrap();

        let raw = store.download(&key("semi.csv")).await.unwrap().unwrap();
        assert!(std::str::from_utf8(&raw).unwrap().starts_with("id;owner;"));
        let read: Vec<Account> = adapter.download_csv(&key("semi.csv")).await.unwrap().unwrap();
        assert_eq!(read, accounts());
    }

    #[test]
    fn delimiter_is_configured_as_a_character() {
        let options: CsvOptions = serde_json::from_str(r#"{"delimiter": ";"}"#).unwrap();
        assert_eq!(options.delimiter, b';');
        assert_eq!(
            serde_json::to_string(&CsvOptions::default()).unwrap(),
            r#"{"delimiter":","}"#
        );
        assert!(serde_json::from_str::<CsvOptions>(r#"{"delimiter": ";;"}"#).is_err());
        assert!(serde_json::from_str::<CsvOptions>(r#"{"delimiter": "é"}"#).is_err());
    }
}
