use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use crate::auth::{password, session};
use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::models::{
    collections, Like, Notification, NotificationView, PostView, Profile, User,
};
use crate::state::AppState;
use crate::store::{to_fields, Direction, DocPath, Fields, Query, WriteBatch};
use crate::validation;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/signup", post(signup))
        .route("/login", post(login))
        .route("/user", post(add_user_details).get(get_authenticated_user))
        .route("/user/{user_name}", get(get_user_details))
        .route("/notifications", post(mark_notifications_read))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignupRequest {
    email: String,
    password: String,
    confirm_password: String,
    user_name: String,
}

#[derive(Deserialize)]
struct LoginRequest {
    email: String,
    password: String,
}

#[derive(Deserialize)]
struct UserDetailsRequest {
    bio: Option<String>,
    website: Option<String>,
    location: Option<String>,
}

async fn signup(
    State(state): State<AppState>,
    Json(req): Json<SignupRequest>,
) -> AppResult<impl IntoResponse> {
    validation::validate_signup(&req.email, &req.password, &req.confirm_password, &req.user_name)
        .map_err(AppError::Validation)?;

    // Username uniqueness is check-then-create; the store has no native
    // uniqueness constraint beyond the key namespace.
    let user_path = DocPath::new(collections::USERS, &req.user_name);
    if state.store.get(&user_path).await?.is_some() {
        return Err(AppError::BadRequest("This username already exists".into()));
    }

    let password_hash =
        password::hash_password(&req.password).map_err(|e| AppError::Internal(e.to_string()))?;
    let user = User {
        user_name: req.user_name.clone(),
        email: req.email,
        password_hash,
        created_at: Utc::now(),
        image_url: state.config.default_image_url(),
        bio: None,
        website: None,
        location: None,
    };
    state.store.set(&user_path, to_fields(&user)?).await?;

    let token = session::create_session(
        state.store.as_ref(),
        &req.user_name,
        state.config.auth.session_hours,
    )
    .await?;

    Ok((StatusCode::CREATED, Json(json!({ "token": token }))))
}

async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> AppResult<Json<serde_json::Value>> {
    validation::validate_login(&req.email, &req.password).map_err(AppError::Validation)?;

    let users = state
        .store
        .query(
            &Query::collection(collections::USERS)
                .filter_eq("email", req.email)
                .limit(1),
        )
        .await?;
    let Some(doc) = users.into_iter().next() else {
        return Err(AppError::WrongCredentials);
    };
    let user: User = doc.to()?;
    if !password::verify_password(&req.password, &user.password_hash) {
        return Err(AppError::WrongCredentials);
    }

    let token = session::create_session(
        state.store.as_ref(),
        &user.user_name,
        state.config.auth.session_hours,
    )
    .await?;
    Ok(Json(json!({ "token": token })))
}

async fn add_user_details(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(req): Json<UserDetailsRequest>,
) -> AppResult<Json<serde_json::Value>> {
    let (bio, website, location) = validation::reduce_user_details(
        req.bio.as_deref(),
        req.website.as_deref(),
        req.location.as_deref(),
    );

    let mut patch = Fields::new();
    if let Some(bio) = bio {
        patch.insert("bio".into(), json!(bio));
    }
    if let Some(website) = website {
        patch.insert("website".into(), json!(website));
    }
    if let Some(location) = location {
        patch.insert("location".into(), json!(location));
    }

    if !patch.is_empty() {
        state
            .store
            .update(&DocPath::new(collections::USERS, &user.user_name), patch)
            .await?;
    }
    Ok(Json(json!({ "message": "Details added successfully" })))
}

/// Own profile, own likes, and the ten most recent notifications.
async fn get_authenticated_user(
    State(state): State<AppState>,
    user: CurrentUser,
) -> AppResult<Json<serde_json::Value>> {
    let profile: User = state
        .store
        .get(&DocPath::new(collections::USERS, &user.user_name))
        .await?
        .ok_or(AppError::NotFound)?
        .to()?;

    let likes = state
        .store
        .query(
            &Query::collection(collections::LIKES)
                .filter_eq("userName", user.user_name.as_str()),
        )
        .await?
        .iter()
        .map(|doc| doc.to::<Like>())
        .collect::<Result<Vec<_>, _>>()?;

    let notifications = state
        .store
        .query(
            &Query::collection(collections::NOTIFICATIONS)
                .filter_eq("recipient", user.user_name.as_str())
                .order_by("createdAt", Direction::Descending)
                .limit(10),
        )
        .await?
        .iter()
        .map(|doc| {
            Ok(NotificationView {
                notification_id: doc.path.id.clone(),
                notification: doc.to::<Notification>()?,
            })
        })
        .collect::<AppResult<Vec<_>>>()?;

    Ok(Json(json!({
        "credentials": Profile::from(profile),
        "likes": likes,
        "notifications": notifications,
    })))
}

/// Any user's public profile and their posts, newest first.
async fn get_user_details(
    State(state): State<AppState>,
    Path(user_name): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    let user: User = state
        .store
        .get(&DocPath::new(collections::USERS, &user_name))
        .await?
        .ok_or(AppError::NotFound)?
        .to()?;

    let posts = state
        .store
        .query(
            &Query::collection(collections::POSTS)
                .filter_eq("userName", user_name.as_str())
                .order_by("createdAt", Direction::Descending),
        )
        .await?
        .iter()
        .map(|doc| {
            Ok(PostView {
                post_id: doc.path.id.clone(),
                post: doc.to()?,
            })
        })
        .collect::<AppResult<Vec<_>>>()?;

    Ok(Json(json!({
        "user": Profile::from(user),
        "posts": posts,
    })))
}

async fn mark_notifications_read(
    State(state): State<AppState>,
    _user: CurrentUser,
    Json(ids): Json<Vec<String>>,
) -> AppResult<Json<serde_json::Value>> {
    let mut batch = WriteBatch::new();
    let mut patch = Fields::new();
    patch.insert("read".into(), json!(true));
    for id in &ids {
        batch.update(DocPath::new(collections::NOTIFICATIONS, id), patch.clone());
    }
    state.store.commit(batch).await?;

    Ok(Json(json!({ "message": "Notifications read" })))
}
