use async_trait::async_trait;

use crate::models::collections;
use crate::store::{
    ChangeEvent, DocPath, DocumentStore, EventKind, Query, StoreError, WriteBatch,
};
use crate::triggers::{Trigger, MAX_BATCH_OPS};

/// Removes every comment, like, and notification referencing a deleted
/// post.
///
/// The three collections are queried sequentially and the delete set is
/// accumulated in a batch local to this invocation before anything is
/// committed. If a query or commit fails, remaining children stay behind
/// as an accepted best-effort gap.
pub struct PostCascade;

const CHILD_COLLECTIONS: [&str; 3] = [
    collections::COMMENTS,
    collections::LIKES,
    collections::NOTIFICATIONS,
];

#[async_trait]
impl Trigger for PostCascade {
    fn name(&self) -> &'static str {
        "post-cascade"
    }

    fn watches(&self) -> (&'static str, EventKind) {
        (collections::POSTS, EventKind::Deleted)
    }

    async fn handle(
        &self,
        store: &dyn DocumentStore,
        event: &ChangeEvent,
    ) -> Result<(), StoreError> {
        let ChangeEvent::Deleted { doc } = event else {
            return Ok(());
        };
        let post_id = doc.path.id.as_str();

        let mut doomed: Vec<DocPath> = Vec::new();
        for collection in CHILD_COLLECTIONS {
            let children = store
                .query(&Query::collection(collection).filter_eq("postId", post_id))
                .await?;
            doomed.extend(children.into_iter().map(|child| child.path));
        }

        if doomed.is_empty() {
            return Ok(());
        }

        tracing::info!(post = post_id, children = doomed.len(), "cascading post delete");
        for chunk in doomed.chunks(MAX_BATCH_OPS) {
            let mut batch = WriteBatch::new();
            for path in chunk {
                batch.delete(path.clone());
            }
            store.commit(batch).await?;
        }
        Ok(())
    }
}
