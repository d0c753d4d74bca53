use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::RwLock;

use async_trait::async_trait;
use serde_json::Value;

use crate::store::{
    merge_fields, Direction, DocPath, Document, DocumentStore, Fields, Query, StoreError,
    WriteBatch, WriteOp,
};

/// In-process document store.
///
/// Collections are `BTreeMap`s keyed by document id, so unordered queries
/// iterate in a deterministic order. A batch applies under a single write
/// guard; an update targeting an absent document fails the whole batch
/// before any operation applies.
#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, BTreeMap<String, Fields>>>,
    writes: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of individual document writes applied so far.
    pub fn write_count(&self) -> u64 {
        self.writes.load(AtomicOrdering::Relaxed)
    }

    fn record_writes(&self, n: u64) {
        self.writes.fetch_add(n, AtomicOrdering::Relaxed);
    }

    fn lock_poisoned() -> StoreError {
        StoreError::Unavailable("store lock poisoned".into())
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, path: &DocPath) -> Result<Option<Document>, StoreError> {
        let collections = self.collections.read().map_err(|_| Self::lock_poisoned())?;
        Ok(collections
            .get(&path.collection)
            .and_then(|docs| docs.get(&path.id))
            .map(|fields| Document::new(path.clone(), fields.clone())))
    }

    async fn set(&self, path: &DocPath, fields: Fields) -> Result<(), StoreError> {
        let mut collections = self.collections.write().map_err(|_| Self::lock_poisoned())?;
        collections
            .entry(path.collection.clone())
            .or_default()
            .insert(path.id.clone(), fields);
        self.record_writes(1);
        Ok(())
    }

    async fn update(&self, path: &DocPath, fields: Fields) -> Result<(), StoreError> {
        let mut collections = self.collections.write().map_err(|_| Self::lock_poisoned())?;
        let existing = collections
            .get_mut(&path.collection)
            .and_then(|docs| docs.get_mut(&path.id))
            .ok_or_else(|| StoreError::NotFound(path.clone()))?;
        *existing = merge_fields(existing, &fields);
        self.record_writes(1);
        Ok(())
    }

    async fn delete(&self, path: &DocPath) -> Result<(), StoreError> {
        let mut collections = self.collections.write().map_err(|_| Self::lock_poisoned())?;
        let removed = collections
            .get_mut(&path.collection)
            .and_then(|docs| docs.remove(&path.id));
        if removed.is_some() {
            self.record_writes(1);
        }
        Ok(())
    }

    async fn add(&self, collection: &str, fields: Fields) -> Result<DocPath, StoreError> {
        let path = DocPath::new(collection, uuid::Uuid::now_v7().to_string());
        self.set(&path, fields).await?;
        Ok(path)
    }

    async fn query(&self, query: &Query) -> Result<Vec<Document>, StoreError> {
        let collections = self.collections.read().map_err(|_| Self::lock_poisoned())?;
        let mut matches: Vec<Document> = collections
            .get(&query.collection)
            .into_iter()
            .flat_map(|docs| docs.iter())
            .filter(|(_, fields)| {
                query
                    .filters
                    .iter()
                    .all(|(field, value)| fields.get(field) == Some(value))
            })
            .map(|(id, fields)| {
                Document::new(DocPath::new(&query.collection, id), fields.clone())
            })
            .collect();

        if let Some((field, direction)) = &query.order_by {
            matches.sort_by(|a, b| {
                let ordering = compare_values(a.fields.get(field), b.fields.get(field));
                match direction {
                    Direction::Ascending => ordering,
                    Direction::Descending => ordering.reverse(),
                }
            });
        }

        if let Some(limit) = query.limit {
            matches.truncate(limit);
        }

        Ok(matches)
    }

    async fn commit(&self, batch: WriteBatch) -> Result<(), StoreError> {
        let mut collections = self.collections.write().map_err(|_| Self::lock_poisoned())?;

        // Validate update targets before applying anything, tracking ids
        // created or deleted earlier in the same batch.
        let mut created: HashSet<DocPath> = HashSet::new();
        let mut deleted: HashSet<DocPath> = HashSet::new();
        for op in batch.ops() {
            let path = op.path();
            let in_store = collections
                .get(&path.collection)
                .is_some_and(|docs| docs.contains_key(&path.id));
            let exists = (in_store || created.contains(path)) && !deleted.contains(path);
            match op {
                WriteOp::Set { .. } => {
                    created.insert(path.clone());
                    deleted.remove(path);
                }
                WriteOp::Update { .. } => {
                    if !exists {
                        return Err(StoreError::NotFound(path.clone()));
                    }
                }
                WriteOp::Delete { .. } => {
                    deleted.insert(path.clone());
                    created.remove(path);
                }
            }
        }

        let mut applied = 0u64;
        for op in batch.into_ops() {
            match op {
                WriteOp::Set { path, fields } => {
                    collections
                        .entry(path.collection)
                        .or_default()
                        .insert(path.id, fields);
                    applied += 1;
                }
                WriteOp::Update { path, fields } => {
                    if let Some(existing) = collections
                        .get_mut(&path.collection)
                        .and_then(|docs| docs.get_mut(&path.id))
                    {
                        *existing = merge_fields(existing, &fields);
                        applied += 1;
                    }
                }
                WriteOp::Delete { path } => {
                    let removed = collections
                        .get_mut(&path.collection)
                        .and_then(|docs| docs.remove(&path.id));
                    if removed.is_some() {
                        applied += 1;
                    }
                }
            }
        }
        self.record_writes(applied);
        Ok(())
    }
}

/// Field ordering for `orderBy`: absent < present, then scalar comparison.
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => match (a, b) {
            (Value::String(a), Value::String(b)) => a.cmp(b),
            (Value::Number(a), Value::Number(b)) => a
                .as_f64()
                .partial_cmp(&b.as_f64())
                .unwrap_or(Ordering::Equal),
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            _ => Ordering::Equal,
        },
    }
}
