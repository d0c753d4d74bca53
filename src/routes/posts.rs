use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::models::{collections, Comment, Like, Post, PostView, User};
use crate::state::AppState;
use crate::store::{to_fields, Direction, DocPath, Document, Fields, Query};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/posts", get(list_posts))
        .route("/post", post(create_post))
        .route("/post/{post_id}", get(get_post).delete(delete_post))
        .route("/post/{post_id}/like", post(like_post))
        .route("/post/{post_id}/unlike", post(unlike_post))
        .route("/post/{post_id}/comment", post(comment_on_post))
}

#[derive(Deserialize)]
struct NewPost {
    body: String,
}

#[derive(Deserialize)]
struct NewComment {
    body: String,
}

fn view(doc: &Document) -> AppResult<PostView> {
    Ok(PostView {
        post_id: doc.path.id.clone(),
        post: doc.to()?,
    })
}

/// All posts, newest first.
async fn list_posts(State(state): State<AppState>) -> AppResult<Json<Vec<PostView>>> {
    let docs = state
        .store
        .query(&Query::collection(collections::POSTS).order_by("createdAt", Direction::Descending))
        .await?;
    let posts = docs.iter().map(view).collect::<AppResult<Vec<_>>>()?;
    Ok(Json(posts))
}

async fn create_post(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(req): Json<NewPost>,
) -> AppResult<impl IntoResponse> {
    let body = req.body.trim();
    if body.is_empty() {
        return Err(AppError::BadRequest("Body must not be empty".into()));
    }

    // Denormalize the author's current image onto the post.
    let author: User = state
        .store
        .get(&DocPath::new(collections::USERS, &user.user_name))
        .await?
        .ok_or(AppError::Unauthorized)?
        .to()?;

    let post = Post {
        user_name: user.user_name,
        body: body.to_string(),
        created_at: Utc::now(),
        image_url: author.image_url,
        like_count: 0,
        comment_count: 0,
    };
    let path = state
        .store
        .add(collections::POSTS, to_fields(&post)?)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(PostView {
            post_id: path.id,
            post,
        }),
    ))
}

/// One post together with its comments, newest comment first.
async fn get_post(
    State(state): State<AppState>,
    Path(post_id): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    let doc = state
        .store
        .get(&DocPath::new(collections::POSTS, &post_id))
        .await?
        .ok_or(AppError::NotFound)?;
    let post = view(&doc)?;

    let comments = state
        .store
        .query(
            &Query::collection(collections::COMMENTS)
                .filter_eq("postId", post_id)
                .order_by("createdAt", Direction::Descending),
        )
        .await?
        .iter()
        .map(|doc| doc.to::<Comment>())
        .collect::<Result<Vec<_>, _>>()?;

    let mut body = serde_json::to_value(&post).map_err(|e| AppError::Internal(e.to_string()))?;
    body["comments"] = json!(comments);
    Ok(Json(body))
}

async fn delete_post(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(post_id): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    let path = DocPath::new(collections::POSTS, &post_id);
    let post: Post = state
        .store
        .get(&path)
        .await?
        .ok_or(AppError::NotFound)?
        .to()?;
    if post.user_name != user.user_name {
        return Err(AppError::Forbidden);
    }

    // The cascade trigger removes the post's comments, likes and
    // notifications.
    state.store.delete(&path).await?;
    Ok(Json(json!({ "message": "Post deleted successfully" })))
}

async fn like_post(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(post_id): Path<String>,
) -> AppResult<Json<PostView>> {
    let post_path = DocPath::new(collections::POSTS, &post_id);
    let post_doc = state.store.get(&post_path).await?.ok_or(AppError::NotFound)?;

    let existing = state
        .store
        .query(
            &Query::collection(collections::LIKES)
                .filter_eq("userName", user.user_name.as_str())
                .filter_eq("postId", post_id.as_str())
                .limit(1),
        )
        .await?;
    if !existing.is_empty() {
        return Err(AppError::BadRequest("Post already liked".into()));
    }

    let like = Like {
        user_name: user.user_name,
        post_id: post_id.clone(),
        created_at: Utc::now(),
    };
    state.store.add(collections::LIKES, to_fields(&like)?).await?;

    let mut post: Post = post_doc.to()?;
    post.like_count += 1;
    let mut patch = Fields::new();
    patch.insert("likeCount".into(), json!(post.like_count));
    state.store.update(&post_path, patch).await?;

    Ok(Json(PostView { post_id, post }))
}

async fn unlike_post(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(post_id): Path<String>,
) -> AppResult<Json<PostView>> {
    let post_path = DocPath::new(collections::POSTS, &post_id);
    let post_doc = state.store.get(&post_path).await?.ok_or(AppError::NotFound)?;

    let existing = state
        .store
        .query(
            &Query::collection(collections::LIKES)
                .filter_eq("userName", user.user_name.as_str())
                .filter_eq("postId", post_id.as_str())
                .limit(1),
        )
        .await?;
    let Some(like) = existing.into_iter().next() else {
        return Err(AppError::BadRequest("Post not liked".into()));
    };

    // Deleting the like fires the notification cleanup trigger.
    state.store.delete(&like.path).await?;

    let mut post: Post = post_doc.to()?;
    post.like_count -= 1;
    let mut patch = Fields::new();
    patch.insert("likeCount".into(), json!(post.like_count));
    state.store.update(&post_path, patch).await?;

    Ok(Json(PostView { post_id, post }))
}

async fn comment_on_post(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(post_id): Path<String>,
    Json(req): Json<NewComment>,
) -> AppResult<impl IntoResponse> {
    let body = req.body.trim();
    if body.is_empty() {
        return Err(AppError::BadRequest("Must not be empty".into()));
    }

    let post_path = DocPath::new(collections::POSTS, &post_id);
    let post_doc = state.store.get(&post_path).await?.ok_or(AppError::NotFound)?;

    let comment = Comment {
        user_name: user.user_name,
        post_id: post_id.clone(),
        body: body.to_string(),
        created_at: Utc::now(),
    };
    state
        .store
        .add(collections::COMMENTS, to_fields(&comment)?)
        .await?;

    let post: Post = post_doc.to()?;
    let mut patch = Fields::new();
    patch.insert("commentCount".into(), json!(post.comment_count + 1));
    state.store.update(&post_path, patch).await?;

    Ok((StatusCode::CREATED, Json(comment)))
}
