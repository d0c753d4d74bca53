//! Route-level tests driving the axum router directly, one request at a
//! time, against a fresh store per test.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use aviary::config::Config;
use aviary::routes;
use aviary::state::AppState;
use aviary::store::{DocumentStore, MemoryStore, WatchedStore};
use aviary::triggers;

fn app() -> (Router, TempDir) {
    let tmp = TempDir::new().unwrap();

    let registry = Arc::new(triggers::registry());
    let store: Arc<dyn DocumentStore> =
        Arc::new(WatchedStore::new(Arc::new(MemoryStore::new()), registry));

    let mut config = Config::default();
    config.storage.uploads = Some(tmp.path().to_path_buf());

    let state = AppState {
        store,
        uploads_dir: tmp.path().to_path_buf(),
        config,
    };
    (routes::router().with_state(state), tmp)
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

/// Sign up a user and return their session token.
async fn signup(app: &Router, user_name: &str) -> String {
    let (status, body) = send(
        app,
        "POST",
        "/signup",
        None,
        Some(json!({
            "userName": user_name,
            "email": format!("{user_name}@example.com"),
            "password": "hunter22",
            "confirmPassword": "hunter22",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "signup failed: {body}");
    body["token"].as_str().unwrap().to_string()
}

async fn create_post(app: &Router, token: &str, body: &str) -> String {
    let (status, post) = send(
        app,
        "POST",
        "/post",
        Some(token),
        Some(json!({ "body": body })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "post failed: {post}");
    post["postId"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn signup_then_login_round_trip() {
    let (app, _tmp) = app();
    signup(&app, "alice").await;

    let (status, body) = send(
        &app,
        "POST",
        "/login",
        None,
        Some(json!({ "email": "alice@example.com", "password": "hunter22" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["token"].is_string());
}

#[tokio::test]
async fn signup_rejects_duplicate_usernames() {
    let (app, _tmp) = app();
    signup(&app, "alice").await;

    let (status, body) = send(
        &app,
        "POST",
        "/signup",
        None,
        Some(json!({
            "userName": "alice",
            "email": "other@example.com",
            "password": "hunter22",
            "confirmPassword": "hunter22",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "This username already exists");
}

#[tokio::test]
async fn signup_reports_field_errors() {
    let (app, _tmp) = app();
    let (status, body) = send(
        &app,
        "POST",
        "/signup",
        None,
        Some(json!({
            "userName": "",
            "email": "not-an-email",
            "password": "hunter22",
            "confirmPassword": "different",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["email"].is_string());
    assert!(body["confirmPassword"].is_string());
    assert!(body["userName"].is_string());
}

#[tokio::test]
async fn login_with_wrong_password_is_forbidden() {
    let (app, _tmp) = app();
    signup(&app, "alice").await;

    let (status, body) = send(
        &app,
        "POST",
        "/login",
        None,
        Some(json!({ "email": "alice@example.com", "password": "nope" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body["general"].is_string());
}

#[tokio::test]
async fn mutations_require_a_session() {
    let (app, _tmp) = app();
    let (status, _) = send(&app, "POST", "/post", None, Some(json!({ "body": "hi" }))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(
        &app,
        "POST",
        "/post",
        Some("bogus-token"),
        Some(json!({ "body": "hi" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn posts_are_listed_newest_first() {
    let (app, _tmp) = app();
    let token = signup(&app, "alice").await;
    create_post(&app, &token, "first").await;
    create_post(&app, &token, "second").await;

    let (status, body) = send(&app, "GET", "/posts", None, None).await;
    assert_eq!(status, StatusCode::OK);
    let posts = body.as_array().unwrap();
    assert_eq!(posts.len(), 2);
    assert_eq!(posts[0]["body"], "second");
    assert_eq!(posts[1]["body"], "first");
}

#[tokio::test]
async fn empty_post_body_is_rejected() {
    let (app, _tmp) = app();
    let token = signup(&app, "alice").await;
    let (status, _) = send(
        &app,
        "POST",
        "/post",
        Some(&token),
        Some(json!({ "body": "   " })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn like_unlike_flow_updates_counts_and_notifications() {
    let (app, _tmp) = app();
    let alice = signup(&app, "alice").await;
    let bob = signup(&app, "bob").await;
    let post_id = create_post(&app, &alice, "hello").await;

    // bob likes alice's post
    let (status, body) = send(
        &app,
        "POST",
        &format!("/post/{post_id}/like"),
        Some(&bob),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["likeCount"], 1);

    // alice sees the notification
    let (_, me) = send(&app, "GET", "/user", Some(&alice), None).await;
    let notifications = me["notifications"].as_array().unwrap();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0]["type"], "like");
    assert_eq!(notifications[0]["sender"], "bob");
    assert_eq!(notifications[0]["read"], false);

    // double like is rejected
    let (status, _) = send(
        &app,
        "POST",
        &format!("/post/{post_id}/like"),
        Some(&bob),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // unlike restores the count and removes the notification
    let (status, body) = send(
        &app,
        "POST",
        &format!("/post/{post_id}/unlike"),
        Some(&bob),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["likeCount"], 0);

    let (_, me) = send(&app, "GET", "/user", Some(&alice), None).await;
    assert!(me["notifications"].as_array().unwrap().is_empty());

    // unliking again is a 400
    let (status, _) = send(
        &app,
        "POST",
        &format!("/post/{post_id}/unlike"),
        Some(&bob),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn commenting_increments_the_count_and_notifies() {
    let (app, _tmp) = app();
    let alice = signup(&app, "alice").await;
    let bob = signup(&app, "bob").await;
    let post_id = create_post(&app, &alice, "hello").await;

    let (status, _) = send(
        &app,
        "POST",
        &format!("/post/{post_id}/comment"),
        Some(&bob),
        Some(json!({ "body": "nice" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, post) = send(&app, "GET", &format!("/post/{post_id}"), None, None).await;
    assert_eq!(post["commentCount"], 1);
    let comments = post["comments"].as_array().unwrap();
    assert_eq!(comments.len(), 1);
    assert_eq!(comments[0]["body"], "nice");

    let (_, me) = send(&app, "GET", "/user", Some(&alice), None).await;
    assert_eq!(me["notifications"][0]["type"], "comment");

    // empty comment and unknown post
    let (status, _) = send(
        &app,
        "POST",
        &format!("/post/{post_id}/comment"),
        Some(&bob),
        Some(json!({ "body": "" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        "POST",
        "/post/nope/comment",
        Some(&bob),
        Some(json!({ "body": "hi" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn only_the_author_can_delete_a_post() {
    let (app, _tmp) = app();
    let alice = signup(&app, "alice").await;
    let bob = signup(&app, "bob").await;
    let post_id = create_post(&app, &alice, "hello").await;

    let (status, _) = send(
        &app,
        "DELETE",
        &format!("/post/{post_id}"),
        Some(&bob),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(
        &app,
        "DELETE",
        &format!("/post/{post_id}"),
        Some(&alice),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, "GET", &format!("/post/{post_id}"), None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn deleting_a_post_clears_its_notifications() {
    let (app, _tmp) = app();
    let alice = signup(&app, "alice").await;
    let bob = signup(&app, "bob").await;
    let post_id = create_post(&app, &alice, "hello").await;

    send(
        &app,
        "POST",
        &format!("/post/{post_id}/like"),
        Some(&bob),
        None,
    )
    .await;
    let (_, me) = send(&app, "GET", "/user", Some(&alice), None).await;
    assert_eq!(me["notifications"].as_array().unwrap().len(), 1);

    send(
        &app,
        "DELETE",
        &format!("/post/{post_id}"),
        Some(&alice),
        None,
    )
    .await;
    let (_, me) = send(&app, "GET", "/user", Some(&alice), None).await;
    assert!(me["notifications"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn profile_details_are_reduced_and_returned() {
    let (app, _tmp) = app();
    let token = signup(&app, "alice").await;

    let (status, _) = send(
        &app,
        "POST",
        "/user",
        Some(&token),
        Some(json!({
            "bio": "  hi there  ",
            "website": "example.com",
            "location": ""
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, "GET", "/user/alice", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["bio"], "hi there");
    assert_eq!(body["user"]["website"], "http://example.com");
    assert!(body["user"].get("location").is_none());
    assert!(body["user"].get("passwordHash").is_none());

    let (status, _) = send(&app, "GET", "/user/nobody", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn notifications_can_be_marked_read() {
    let (app, _tmp) = app();
    let alice = signup(&app, "alice").await;
    let bob = signup(&app, "bob").await;
    let post_id = create_post(&app, &alice, "hello").await;

    send(
        &app,
        "POST",
        &format!("/post/{post_id}/like"),
        Some(&bob),
        None,
    )
    .await;
    let (_, me) = send(&app, "GET", "/user", Some(&alice), None).await;
    let id = me["notifications"][0]["notificationId"].as_str().unwrap().to_string();

    let (status, _) = send(
        &app,
        "POST",
        "/notifications",
        Some(&alice),
        Some(json!([id])),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, me) = send(&app, "GET", "/user", Some(&alice), None).await;
    assert_eq!(me["notifications"][0]["read"], true);
}

#[tokio::test]
async fn image_upload_updates_the_user_and_their_posts() {
    let (app, _tmp) = app();
    let token = signup(&app, "alice").await;
    create_post(&app, &token, "hello").await;

    let boundary = "AaB03x";
    let payload = format!(
        "--{boundary}\r\n\
         Content-Disposition: form-data; name=\"image\"; filename=\"me.png\"\r\n\
         Content-Type: image/png\r\n\r\n\
         fake png bytes\r\n\
         --{boundary}--\r\n"
    );
    let request = Request::builder()
        .method("POST")
        .uri("/user/image")
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(payload))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // The new URL lands on the profile and is propagated onto the post.
    let (_, body) = send(&app, "GET", "/user/alice", None, None).await;
    let image_url = body["user"]["imageUrl"].as_str().unwrap().to_string();
    assert!(image_url.starts_with("/media/"));
    assert!(image_url.ends_with(".png"));
    assert_eq!(body["posts"][0]["imageUrl"].as_str().unwrap(), image_url);

    // The stored file is served back.
    let (status, _) = send(&app, "GET", &image_url, None, None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn non_image_uploads_are_rejected() {
    let (app, _tmp) = app();
    let token = signup(&app, "alice").await;

    let boundary = "AaB03x";
    let payload = format!(
        "--{boundary}\r\n\
         Content-Disposition: form-data; name=\"image\"; filename=\"evil.html\"\r\n\
         Content-Type: text/html\r\n\r\n\
         <script></script>\r\n\
         --{boundary}--\r\n"
    );
    let request = Request::builder()
        .method("POST")
        .uri("/user/image")
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(payload))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
