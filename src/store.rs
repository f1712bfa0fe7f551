//! Document store abstraction and the in-memory implementation.
//!
//! Documents are JSON objects addressed by slash-separated paths
//! (`profiles/u1`, `profiles/u1/events/<id>`). A collection is the path
//! prefix of its documents.
//!
//! `increment` and `array_union` are atomic. `set` is a plain write: callers
//! that read, decide and then `set` may race with another session (last
//! write wins).

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use tracing::{debug, instrument};
use uuid::Uuid;

pub type Document = Map<String, Value>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
  #[error("store unavailable: {0}")]
  Unavailable(String),
  #[error("field '{field}' of {path} is not a number")]
  NotNumeric { path: String, field: String },
  #[error("field '{field}' of {path} is not an array")]
  NotArray { path: String, field: String },
  #[error("malformed document at {path}: {source}")]
  Malformed { path: String, #[source] source: serde_json::Error },
  #[error("serialization failed: {0}")]
  Serialize(#[from] serde_json::Error),
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
  async fn get(&self, path: &str) -> Result<Option<Document>, StoreError>;

  /// Write a document. With `merge`, nested objects are merged field by field
  /// and fields not present in `doc` are left untouched.
  async fn set(&self, path: &str, doc: Document, merge: bool) -> Result<(), StoreError>;

  /// Atomically add `delta` to a numeric top-level field, creating the
  /// document and field (from 0) when missing.
  async fn increment(&self, path: &str, field: &str, delta: i64) -> Result<(), StoreError>;

  /// Atomically add each value not already present to an array field.
  async fn array_union(&self, path: &str, field: &str, values: Vec<Value>) -> Result<(), StoreError>;

  /// Append a document with a generated id; returns the id.
  async fn add(&self, collection: &str, doc: Document) -> Result<String, StoreError>;

  /// Direct children of a collection as `(id, document)` pairs, ordered by id.
  async fn list(&self, collection: &str) -> Result<Vec<(String, Document)>, StoreError>;
}

/// Deep merge of `patch` into `target`: objects merge recursively, anything else overwrites.
pub fn merge_into(target: &mut Document, patch: Document) {
  for (key, value) in patch {
    match (target.get_mut(&key), value) {
      (Some(Value::Object(existing)), Value::Object(incoming)) => merge_into(existing, incoming),
      (Some(slot), value) => *slot = value,
      (None, value) => { target.insert(key, value); }
    }
  }
}

/// Serialize a value that must be a JSON object into a `Document`.
pub fn to_document<T: serde::Serialize>(value: &T) -> Result<Document, StoreError> {
  match serde_json::to_value(value)? {
    Value::Object(map) => Ok(map),
    other => {
      let mut map = Document::new();
      map.insert("value".into(), other);
      Ok(map)
    }
  }
}

/// Deserialize a stored document into a typed record.
pub fn from_document<T: serde::de::DeserializeOwned>(path: &str, doc: Document) -> Result<T, StoreError> {
  serde_json::from_value(Value::Object(doc)).map_err(|source| StoreError::Malformed { path: path.to_string(), source })
}

/// In-memory store; all documents live in one ordered map behind a tokio `RwLock`.
#[derive(Default)]
pub struct MemoryStore {
  docs: RwLock<BTreeMap<String, Document>>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }
}

#[async_trait]
impl DocumentStore for MemoryStore {
  #[instrument(level = "trace", skip(self))]
  async fn get(&self, path: &str) -> Result<Option<Document>, StoreError> {
    Ok(self.docs.read().await.get(path).cloned())
  }

  #[instrument(level = "trace", skip(self, doc))]
  async fn set(&self, path: &str, doc: Document, merge: bool) -> Result<(), StoreError> {
    let mut docs = self.docs.write().await;
    if merge {
      if let Some(existing) = docs.get_mut(path) {
        merge_into(existing, doc);
        return Ok(());
      }
    }
    docs.insert(path.to_string(), doc);
    Ok(())
  }

  #[instrument(level = "trace", skip(self))]
  async fn increment(&self, path: &str, field: &str, delta: i64) -> Result<(), StoreError> {
    let mut docs = self.docs.write().await;
    let doc = docs.entry(path.to_string()).or_default();
    let next = match doc.get(field) {
      None | Some(Value::Null) => Value::from(delta),
      Some(Value::Number(n)) => match n.as_i64() {
        Some(i) => Value::from(i.saturating_add(delta)),
        None => n
          .as_f64()
          .and_then(|f| serde_json::Number::from_f64(f + delta as f64))
          .map(Value::Number)
          .ok_or_else(|| StoreError::NotNumeric { path: path.into(), field: field.into() })?,
      },
      Some(_) => return Err(StoreError::NotNumeric { path: path.into(), field: field.into() }),
    };
    doc.insert(field.to_string(), next);
    Ok(())
  }

  #[instrument(level = "trace", skip(self, values))]
  async fn array_union(&self, path: &str, field: &str, values: Vec<Value>) -> Result<(), StoreError> {
    let mut docs = self.docs.write().await;
    let doc = docs.entry(path.to_string()).or_default();
    let slot = doc.entry(field.to_string()).or_insert_with(|| Value::Array(Vec::new()));
    if slot.is_null() {
      *slot = Value::Array(Vec::new());
    }
    let arr = slot
      .as_array_mut()
      .ok_or_else(|| StoreError::NotArray { path: path.into(), field: field.into() })?;
    for v in values {
      if !arr.contains(&v) {
        arr.push(v);
      }
    }
    Ok(())
  }

  #[instrument(level = "trace", skip(self, doc))]
  async fn add(&self, collection: &str, doc: Document) -> Result<String, StoreError> {
    let id = Uuid::new_v4().simple().to_string();
    self.docs.write().await.insert(crate::util::doc_path(collection, &id), doc);
    debug!(target: "gridwise", %collection, %id, "Document appended");
    Ok(id)
  }

  #[instrument(level = "trace", skip(self))]
  async fn list(&self, collection: &str) -> Result<Vec<(String, Document)>, StoreError> {
    let prefix = format!("{}/", collection);
    let docs = self.docs.read().await;
    Ok(
      docs
        .range(prefix.clone()..)
        .take_while(|(k, _)| k.starts_with(&prefix))
        .filter(|(k, _)| !k[prefix.len()..].contains('/'))
        .map(|(k, v)| (k[prefix.len()..].to_string(), v.clone()))
        .collect(),
    )
  }
}

/// Store doubles for exercising failure paths.
#[cfg(test)]
pub mod testing {
  use std::sync::atomic::{AtomicBool, Ordering};

  use super::*;

  /// Wraps a `MemoryStore`; while offline every operation fails with `Unavailable`.
  #[derive(Default)]
  pub struct FlakyStore {
    pub inner: MemoryStore,
    offline: AtomicBool,
  }

  impl FlakyStore {
    pub fn set_offline(&self, offline: bool) {
      self.offline.store(offline, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), StoreError> {
      if self.offline.load(Ordering::SeqCst) {
        Err(StoreError::Unavailable("offline".into()))
      } else {
        Ok(())
      }
    }
  }

  #[async_trait]
  impl DocumentStore for FlakyStore {
    async fn get(&self, path: &str) -> Result<Option<Document>, StoreError> {
      self.check()?;
      self.inner.get(path).await
    }
    async fn set(&self, path: &str, doc: Document, merge: bool) -> Result<(), StoreError> {
      self.check()?;
      self.inner.set(path, doc, merge).await
    }
    async fn increment(&self, path: &str, field: &str, delta: i64) -> Result<(), StoreError> {
      self.check()?;
      self.inner.increment(path, field, delta).await
    }
    async fn array_union(&self, path: &str, field: &str, values: Vec<Value>) -> Result<(), StoreError> {
      self.check()?;
      self.inner.array_union(path, field, values).await
    }
    async fn add(&self, collection: &str, doc: Document) -> Result<String, StoreError> {
      self.check()?;
      self.inner.add(collection, doc).await
    }
    async fn list(&self, collection: &str) -> Result<Vec<(String, Document)>, StoreError> {
      self.check()?;
      self.inner.list(collection).await
    }
  }
}

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use serde_json::json;

  use super::*;

  fn doc(v: Value) -> Document {
    v.as_object().cloned().expect("object")
  }

  #[tokio::test]
  async fn merge_set_keeps_untouched_nested_fields() {
    let s = MemoryStore::new();
    s.set("progress/u1", doc(json!({"tariffs": {"step": 3, "score": 70}})), true).await.unwrap();
    s.set("progress/u1", doc(json!({"tariffs": {"step": 4}})), true).await.unwrap();
    let d = s.get("progress/u1").await.unwrap().unwrap();
    assert_eq!(d["tariffs"], json!({"step": 4, "score": 70}));

    s.set("progress/u1", doc(json!({"x": 1})), false).await.unwrap();
    let d = s.get("progress/u1").await.unwrap().unwrap();
    assert!(d.get("tariffs").is_none());
  }

  #[tokio::test]
  async fn increment_creates_lazily_and_rejects_non_numbers() {
    let s = MemoryStore::new();
    s.increment("metrics_daily/2024-01-01", "clicks", 1).await.unwrap();
    s.increment("metrics_daily/2024-01-01", "clicks", 2).await.unwrap();
    let d = s.get("metrics_daily/2024-01-01").await.unwrap().unwrap();
    assert_eq!(d["clicks"], json!(3));

    s.set("profiles/u1", doc(json!({"points": "many"})), true).await.unwrap();
    let err = s.increment("profiles/u1", "points", 1).await.unwrap_err();
    assert!(matches!(err, StoreError::NotNumeric { .. }));
  }

  #[tokio::test]
  async fn concurrent_increments_are_not_lost() {
    let s = Arc::new(MemoryStore::new());
    let mut tasks = Vec::new();
    for _ in 0..50 {
      let s = s.clone();
      tasks.push(tokio::spawn(async move { s.increment("profiles/u1", "points", 10).await }));
    }
    for t in tasks {
      t.await.unwrap().unwrap();
    }
    let d = s.get("profiles/u1").await.unwrap().unwrap();
    assert_eq!(d["points"], json!(500));
  }

  #[tokio::test]
  async fn array_union_has_set_semantics() {
    let s = MemoryStore::new();
    for _ in 0..3 {
      s.array_union("profiles/u1", "badges", vec![json!("Expert")]).await.unwrap();
    }
    s.array_union("profiles/u1", "badges", vec![json!("Knowledgeable"), json!("Expert")]).await.unwrap();
    let d = s.get("profiles/u1").await.unwrap().unwrap();
    assert_eq!(d["badges"], json!(["Expert", "Knowledgeable"]));
  }

  #[tokio::test]
  async fn list_returns_direct_children_only() {
    let s = MemoryStore::new();
    let id = s.add("profiles/u1/events", doc(json!({"type": "click"}))).await.unwrap();
    s.add("profiles/u2/events", doc(json!({"type": "click"}))).await.unwrap();
    s.set("profiles/u1", doc(json!({"points": 0})), false).await.unwrap();

    let events = s.list("profiles/u1/events").await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].0, id);

    let profiles = s.list("profiles").await.unwrap();
    assert_eq!(profiles.iter().map(|(k, _)| k.as_str()).collect::<Vec<_>>(), vec!["u1"]);
  }
}
