use chrono::{Duration, Utc};
use rand::Rng;

use crate::models::{collections, Session};
use crate::store::{to_fields, DocPath, DocumentStore, StoreError};

/// Create a new session for a user. Returns the session token.
pub async fn create_session(
    store: &dyn DocumentStore,
    user_name: &str,
    hours: u64,
) -> Result<String, StoreError> {
    let token = generate_token();
    let now = Utc::now();
    let session = Session {
        user_name: user_name.to_string(),
        created_at: now,
        expires_at: now + Duration::hours(hours as i64),
    };

    store
        .set(
            &DocPath::new(collections::SESSIONS, &token),
            to_fields(&session)?,
        )
        .await?;
    Ok(token)
}

/// Resolve a token to its username, or None when unknown or expired.
pub async fn resolve_session(
    store: &dyn DocumentStore,
    token: &str,
) -> Result<Option<String>, StoreError> {
    let Some(doc) = store
        .get(&DocPath::new(collections::SESSIONS, token))
        .await?
    else {
        return Ok(None);
    };
    let session: Session = doc.to()?;
    if session.expires_at <= Utc::now() {
        return Ok(None);
    }
    Ok(Some(session.user_name))
}

/// Delete a session by token.
pub async fn delete_session(store: &dyn DocumentStore, token: &str) -> Result<(), StoreError> {
    store
        .delete(&DocPath::new(collections::SESSIONS, token))
        .await
}

/// Generate a cryptographically random 32-byte hex token.
fn generate_token() -> String {
    let mut rng = rand::thread_rng();
    let bytes: [u8; 32] = rng.gen();
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
