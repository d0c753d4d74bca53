use async_trait::async_trait;
use chrono::Utc;

use crate::models::{collections, Comment, Like, Notification, NotificationKind, Post};
use crate::store::{
    to_fields, ChangeEvent, DocPath, Document, DocumentStore, EventKind, StoreError,
};
use crate::triggers::Trigger;

/// Creates a notification for the post author when someone likes a post.
///
/// The notification reuses the like's id, so re-running for the same like
/// overwrites the same document and cleanup on unlike is a direct delete.
pub struct LikeNotifier;

#[async_trait]
impl Trigger for LikeNotifier {
    fn name(&self) -> &'static str {
        "like-notifier"
    }

    fn watches(&self) -> (&'static str, EventKind) {
        (collections::LIKES, EventKind::Created)
    }

    async fn handle(
        &self,
        store: &dyn DocumentStore,
        event: &ChangeEvent,
    ) -> Result<(), StoreError> {
        let ChangeEvent::Created { doc } = event else {
            return Ok(());
        };
        let like: Like = doc.to()?;
        notify(store, doc, &like.user_name, &like.post_id, NotificationKind::Like).await
    }
}

/// Deletes the notification keyed by a removed like's id. Deleting an
/// already-absent notification is not an error.
pub struct UnlikeCleaner;

#[async_trait]
impl Trigger for UnlikeCleaner {
    fn name(&self) -> &'static str {
        "unlike-cleaner"
    }

    fn watches(&self) -> (&'static str, EventKind) {
        (collections::LIKES, EventKind::Deleted)
    }

    async fn handle(
        &self,
        store: &dyn DocumentStore,
        event: &ChangeEvent,
    ) -> Result<(), StoreError> {
        let ChangeEvent::Deleted { doc } = event else {
            return Ok(());
        };
        store
            .delete(&DocPath::new(collections::NOTIFICATIONS, &doc.path.id))
            .await
    }
}

/// Creates a notification for the post author when someone comments.
///
/// There is no symmetric cleanup on comment deletion: nothing in the API
/// deletes a comment, so comment notifications outlive their comments only
/// until the post itself is deleted and the cascade removes them.
pub struct CommentNotifier;

#[async_trait]
impl Trigger for CommentNotifier {
    fn name(&self) -> &'static str {
        "comment-notifier"
    }

    fn watches(&self) -> (&'static str, EventKind) {
        (collections::COMMENTS, EventKind::Created)
    }

    async fn handle(
        &self,
        store: &dyn DocumentStore,
        event: &ChangeEvent,
    ) -> Result<(), StoreError> {
        let ChangeEvent::Created { doc } = event else {
            return Ok(());
        };
        let comment: Comment = doc.to()?;
        notify(
            store,
            doc,
            &comment.user_name,
            &comment.post_id,
            NotificationKind::Comment,
        )
        .await
    }
}

/// Shared body of the like and comment rules: look up the referenced post,
/// skip silently when it is gone or the actor is the author, otherwise
/// write the notification keyed by the source document's id.
async fn notify(
    store: &dyn DocumentStore,
    source: &Document,
    sender: &str,
    post_id: &str,
    kind: NotificationKind,
) -> Result<(), StoreError> {
    let post_path = DocPath::new(collections::POSTS, post_id);
    let Some(post_doc) = store.get(&post_path).await? else {
        tracing::debug!(source = %source.path, post = %post_path, "post gone, no notification");
        return Ok(());
    };
    let post: Post = post_doc.to()?;
    if post.user_name == sender {
        return Ok(());
    }

    let notification = Notification {
        recipient: post.user_name,
        sender: sender.to_string(),
        post_id: post_id.to_string(),
        kind,
        read: false,
        created_at: Utc::now(),
    };
    store
        .set(
            &DocPath::new(collections::NOTIFICATIONS, &source.path.id),
            to_fields(&notification)?,
        )
        .await
}
