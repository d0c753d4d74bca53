use async_trait::async_trait;
use serde_json::json;

use crate::models::{collections, User};
use crate::store::{
    ChangeEvent, DocumentStore, EventKind, Fields, Query, StoreError, WriteBatch,
};
use crate::triggers::{Trigger, MAX_BATCH_OPS};

/// Keeps the denormalized `imageUrl` on posts in step with their author.
///
/// Fires on every user update, so the before/after comparison guard is
/// load-bearing: an update that leaves `imageUrl` unchanged must perform
/// zero writes.
pub struct ImagePropagator;

#[async_trait]
impl Trigger for ImagePropagator {
    fn name(&self) -> &'static str {
        "image-propagator"
    }

    fn watches(&self) -> (&'static str, EventKind) {
        (collections::USERS, EventKind::Updated)
    }

    async fn handle(
        &self,
        store: &dyn DocumentStore,
        event: &ChangeEvent,
    ) -> Result<(), StoreError> {
        let ChangeEvent::Updated { before, after } = event else {
            return Ok(());
        };
        if before.str_field("imageUrl") == after.str_field("imageUrl") {
            return Ok(());
        }

        let user: User = after.to()?;
        let posts = store
            .query(&Query::collection(collections::POSTS).filter_eq("userName", user.user_name))
            .await?;
        if posts.is_empty() {
            return Ok(());
        }

        let mut patch = Fields::new();
        patch.insert("imageUrl".into(), json!(user.image_url));

        tracing::info!(user = %after.path.id, posts = posts.len(), "propagating image change");
        for chunk in posts.chunks(MAX_BATCH_OPS) {
            let mut batch = WriteBatch::new();
            for post in chunk {
                batch.update(post.path.clone(), patch.clone());
            }
            store.commit(batch).await?;
        }
        Ok(())
    }
}
