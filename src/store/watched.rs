use std::sync::Arc;

use async_trait::async_trait;

use crate::store::{
    merge_fields, DocPath, Document, DocumentStore, Fields, Query, StoreError, WriteBatch, WriteOp,
};
use crate::triggers::TriggerRegistry;

/// Document lifecycle event kinds a handler can watch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Created,
    Updated,
    Deleted,
}

/// A change to a single document. Updates carry both the before- and
/// after-state; deletes carry the final state the document had.
#[derive(Debug, Clone)]
pub enum ChangeEvent {
    Created { doc: Document },
    Updated { before: Document, after: Document },
    Deleted { doc: Document },
}

impl ChangeEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            ChangeEvent::Created { .. } => EventKind::Created,
            ChangeEvent::Updated { .. } => EventKind::Updated,
            ChangeEvent::Deleted { .. } => EventKind::Deleted,
        }
    }

    pub fn path(&self) -> &DocPath {
        match self {
            ChangeEvent::Created { doc } => &doc.path,
            ChangeEvent::Updated { after, .. } => &after.path,
            ChangeEvent::Deleted { doc } => &doc.path,
        }
    }
}

/// Store wrapper that dispatches change events to registered triggers.
///
/// Events fire only for mutations that actually changed a document:
/// deleting an absent document emits nothing. Derived writes performed by
/// triggers go through this wrapper too, so they dispatch in turn.
///
/// A batch commit reads before-states, commits once, then dispatches one
/// event per effective operation. The reads are not part of the atomic
/// unit, so an event's before-state can be stale under concurrent writers.
pub struct WatchedStore {
    inner: Arc<dyn DocumentStore>,
    triggers: Arc<TriggerRegistry>,
}

impl WatchedStore {
    pub fn new(inner: Arc<dyn DocumentStore>, triggers: Arc<TriggerRegistry>) -> Self {
        Self { inner, triggers }
    }

    async fn dispatch(&self, event: ChangeEvent) {
        self.triggers.dispatch(self, &event).await;
    }
}

#[async_trait]
impl DocumentStore for WatchedStore {
    async fn get(&self, path: &DocPath) -> Result<Option<Document>, StoreError> {
        self.inner.get(path).await
    }

    async fn set(&self, path: &DocPath, fields: Fields) -> Result<(), StoreError> {
        let before = self.inner.get(path).await?;
        self.inner.set(path, fields.clone()).await?;

        let after = Document::new(path.clone(), fields);
        let event = match before {
            Some(before) => ChangeEvent::Updated { before, after },
            None => ChangeEvent::Created { doc: after },
        };
        self.dispatch(event).await;
        Ok(())
    }

    async fn update(&self, path: &DocPath, fields: Fields) -> Result<(), StoreError> {
        let before = self
            .inner
            .get(path)
            .await?
            .ok_or_else(|| StoreError::NotFound(path.clone()))?;
        self.inner.update(path, fields.clone()).await?;

        let after = Document::new(path.clone(), merge_fields(&before.fields, &fields));
        self.dispatch(ChangeEvent::Updated { before, after }).await;
        Ok(())
    }

    async fn delete(&self, path: &DocPath) -> Result<(), StoreError> {
        let before = self.inner.get(path).await?;
        self.inner.delete(path).await?;

        if let Some(doc) = before {
            self.dispatch(ChangeEvent::Deleted { doc }).await;
        }
        Ok(())
    }

    async fn add(&self, collection: &str, fields: Fields) -> Result<DocPath, StoreError> {
        let path = self.inner.add(collection, fields.clone()).await?;
        self.dispatch(ChangeEvent::Created {
            doc: Document::new(path.clone(), fields),
        })
        .await;
        Ok(path)
    }

    async fn query(&self, query: &Query) -> Result<Vec<Document>, StoreError> {
        self.inner.query(query).await
    }

    async fn commit(&self, batch: WriteBatch) -> Result<(), StoreError> {
        let mut befores = Vec::with_capacity(batch.len());
        for op in batch.ops() {
            befores.push(self.inner.get(op.path()).await?);
        }

        let ops = batch.clone().into_ops();
        self.inner.commit(batch).await?;

        for (op, before) in ops.into_iter().zip(befores) {
            let event = match (op, before) {
                (WriteOp::Set { path, fields }, None) => ChangeEvent::Created {
                    doc: Document::new(path, fields),
                },
                (WriteOp::Set { path, fields }, Some(before)) => ChangeEvent::Updated {
                    before,
                    after: Document::new(path, fields),
                },
                (WriteOp::Update { path, fields }, Some(before)) => {
                    let after = Document::new(path, merge_fields(&before.fields, &fields));
                    ChangeEvent::Updated { before, after }
                }
                // Update of a document created earlier in the same batch;
                // no pre-commit state to report, treat as its creation.
                (WriteOp::Update { path, fields }, None) => ChangeEvent::Created {
                    doc: Document::new(path, fields),
                },
                (WriteOp::Delete { path }, Some(doc)) => {
                    ChangeEvent::Deleted {
                        doc: Document::new(path, doc.fields),
                    }
                }
                (WriteOp::Delete { .. }, None) => continue,
            };
            self.dispatch(event).await;
        }
        Ok(())
    }
}
