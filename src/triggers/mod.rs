//! Reactive consistency engine.
//!
//! Each trigger watches one (collection, event kind) pair and applies
//! derived writes when a matching document change is dispatched. Failures
//! are logged and swallowed: an event is handled exactly once, with no
//! retry, and derived data converges best-effort.

pub mod cascade;
pub mod notifications;
pub mod propagation;

pub use cascade::PostCascade;
pub use notifications::{CommentNotifier, LikeNotifier, UnlikeCleaner};
pub use propagation::ImagePropagator;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::store::{ChangeEvent, DocumentStore, EventKind, StoreError};

/// Upper bound on operations per committed batch. Larger write sets are
/// split into consecutive commits, each atomic on its own.
pub const MAX_BATCH_OPS: usize = 500;

/// A reactive rule: watches one (collection, event kind) pair and applies
/// derived writes through the store it is handed.
#[async_trait]
pub trait Trigger: Send + Sync {
    fn name(&self) -> &'static str;

    fn watches(&self) -> (&'static str, EventKind);

    async fn handle(
        &self,
        store: &dyn DocumentStore,
        event: &ChangeEvent,
    ) -> Result<(), StoreError>;
}

/// Explicit dispatch table mapping (collection, event kind) to handlers,
/// built once at startup so the wiring is inspectable without a store.
#[derive(Default)]
pub struct TriggerRegistry {
    handlers: HashMap<(String, EventKind), Vec<Arc<dyn Trigger>>>,
    count: usize,
}

impl TriggerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, trigger: Arc<dyn Trigger>) {
        let (collection, kind) = trigger.watches();
        self.handlers
            .entry((collection.to_string(), kind))
            .or_default()
            .push(trigger);
        self.count += 1;
    }

    /// Number of registered triggers.
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn handlers_for(&self, collection: &str, kind: EventKind) -> &[Arc<dyn Trigger>] {
        self.handlers
            .get(&(collection.to_string(), kind))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Run every handler watching the event's (collection, kind) pair.
    /// Handler errors are logged and swallowed; the event is terminally
    /// handled either way.
    pub async fn dispatch(&self, store: &dyn DocumentStore, event: &ChangeEvent) {
        for trigger in self.handlers_for(&event.path().collection, event.kind()) {
            if let Err(err) = trigger.handle(store, event).await {
                tracing::error!(
                    trigger = trigger.name(),
                    doc = %event.path(),
                    error = %err,
                    "trigger failed, event dropped"
                );
            }
        }
    }
}

/// The full rule set, wired the way the running server uses it.
pub fn registry() -> TriggerRegistry {
    let mut registry = TriggerRegistry::new();
    registry.register(Arc::new(LikeNotifier));
    registry.register(Arc::new(UnlikeCleaner));
    registry.register(Arc::new(CommentNotifier));
    registry.register(Arc::new(ImagePropagator));
    registry.register(Arc::new(PostCascade));
    registry
}
