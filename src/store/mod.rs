// Document store abstraction - isolates all persistence side effects
pub mod batch;
pub mod memory;
pub mod watched;

pub use batch::{WriteBatch, WriteOp};
pub use memory::MemoryStore;
pub use watched::{ChangeEvent, EventKind, WatchedStore};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;

/// Field map of a single document. Keys use the stored (camelCase) names.
pub type Fields = Map<String, Value>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Not found: {0}")]
    NotFound(DocPath),

    #[error("Malformed document at {path}: {source}")]
    Malformed {
        path: DocPath,
        source: serde_json::Error,
    },

    #[error("Encode error: {0}")]
    Encode(serde_json::Error),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Collection + identifier address of a document.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocPath {
    pub collection: String,
    pub id: String,
}

impl DocPath {
    pub fn new(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            id: id.into(),
        }
    }
}

impl fmt::Display for DocPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.id)
    }
}

/// A document as read from the store.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub path: DocPath,
    pub fields: Fields,
}

impl Document {
    pub fn new(path: DocPath, fields: Fields) -> Self {
        Self { path, fields }
    }

    /// String field accessor for the common case.
    pub fn str_field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }

    /// Deserialize the field map into a typed model.
    pub fn to<T: DeserializeOwned>(&self) -> Result<T, StoreError> {
        serde_json::from_value(Value::Object(self.fields.clone())).map_err(|source| {
            StoreError::Malformed {
                path: self.path.clone(),
                source,
            }
        })
    }
}

/// Serialize a model into a document field map.
pub fn to_fields<T: Serialize>(value: &T) -> Result<Fields, StoreError> {
    match serde_json::to_value(value).map_err(StoreError::Encode)? {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::Encode(serde::ser::Error::custom(format!(
            "expected a JSON object, got {other}"
        )))),
    }
}

/// Merge a partial field map over an existing one (top-level keys overwrite).
pub(crate) fn merge_fields(base: &Fields, patch: &Fields) -> Fields {
    let mut merged = base.clone();
    for (key, value) in patch {
        merged.insert(key.clone(), value.clone());
    }
    merged
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

/// Equality-filtered collection query with optional ordering and limit.
#[derive(Debug, Clone)]
pub struct Query {
    pub collection: String,
    pub filters: Vec<(String, Value)>,
    pub order_by: Option<(String, Direction)>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn collection(name: impl Into<String>) -> Self {
        Self {
            collection: name.into(),
            filters: Vec::new(),
            order_by: None,
            limit: None,
        }
    }

    pub fn filter_eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push((field.into(), value.into()));
        self
    }

    pub fn order_by(mut self, field: impl Into<String>, direction: Direction) -> Self {
        self.order_by = Some((field.into(), direction));
        self
    }

    pub fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }
}

/// Generic document store: path-addressed reads and writes, equality
/// queries, and atomic multi-operation batches. `delete` is
/// delete-if-exists; `update` fails on an absent target.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, path: &DocPath) -> Result<Option<Document>, StoreError>;

    /// Create or fully replace the document at `path`.
    async fn set(&self, path: &DocPath, fields: Fields) -> Result<(), StoreError>;

    /// Merge `fields` into the existing document at `path`.
    async fn update(&self, path: &DocPath, fields: Fields) -> Result<(), StoreError>;

    async fn delete(&self, path: &DocPath) -> Result<(), StoreError>;

    /// Insert with a store-generated identifier.
    async fn add(&self, collection: &str, fields: Fields) -> Result<DocPath, StoreError>;

    async fn query(&self, query: &Query) -> Result<Vec<Document>, StoreError>;

    /// Apply every accumulated operation atomically.
    async fn commit(&self, batch: WriteBatch) -> Result<(), StoreError>;
}
