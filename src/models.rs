use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Collection names used across the store.
pub mod collections {
    pub const USERS: &str = "users";
    pub const POSTS: &str = "posts";
    pub const LIKES: &str = "likes";
    pub const COMMENTS: &str = "comments";
    pub const NOTIFICATIONS: &str = "notifications";
    pub const SESSIONS: &str = "sessions";
}

/// A user document, keyed by the chosen username.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub user_name: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub image_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

/// A post document. `image_url` is the author's image at write time and is
/// kept current by the propagation trigger.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub user_name: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub image_url: String,
    pub like_count: i64,
    pub comment_count: i64,
}

/// A like edge between a user and a post.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Like {
    pub user_name: String,
    pub post_id: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub user_name: String,
    pub post_id: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Like,
    Comment,
}

/// A notification document, keyed by the id of the like or comment that
/// produced it. The shared key makes unlike cleanup a direct delete.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub recipient: String,
    pub sender: String,
    pub post_id: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

/// A bearer session, keyed by its token.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub user_name: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Public view of a user, without credentials.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub user_name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub image_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl From<User> for Profile {
    fn from(user: User) -> Self {
        Self {
            user_name: user.user_name,
            email: user.email,
            created_at: user.created_at,
            image_url: user.image_url,
            bio: user.bio,
            website: user.website,
            location: user.location,
        }
    }
}

/// A post together with its store id, as returned by the API.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostView {
    pub post_id: String,
    #[serde(flatten)]
    pub post: Post,
}

/// A notification together with its store id.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationView {
    pub notification_id: String,
    #[serde(flatten)]
    pub notification: Notification,
}
