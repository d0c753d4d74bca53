use axum::extract::{Multipart, Path, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use rand::Rng;
use serde_json::json;

use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::models::collections;
use crate::state::AppState;
use crate::store::{DocPath, Fields};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/user/image", post(upload_image))
        .route("/media/{file}", get(serve_media))
}

/// Accept a jpeg/png profile image, store it under the uploads dir, and
/// point the user's `imageUrl` at it. The user update fires the image
/// propagation trigger, which rewrites the URL onto the user's posts.
async fn upload_image(
    State(state): State<AppState>,
    user: CurrentUser,
    mut multipart: Multipart,
) -> AppResult<Json<serde_json::Value>> {
    let mut saved: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        let extension = match field.content_type() {
            Some("image/jpeg") => "jpg",
            Some("image/png") => "png",
            _ => return Err(AppError::BadRequest("Wrong file type submitted".into())),
        };

        let file_name = format!("{:016x}.{}", rand::thread_rng().gen::<u64>(), extension);
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(e.to_string()))?;
        tokio::fs::write(state.uploads_dir.join(&file_name), &data)
            .await
            .map_err(|e| AppError::Internal(e.to_string()))?;
        saved = Some(file_name);
    }

    let file_name = saved.ok_or_else(|| AppError::BadRequest("No image submitted".into()))?;

    let mut patch = Fields::new();
    patch.insert("imageUrl".into(), json!(format!("/media/{file_name}")));
    state
        .store
        .update(&DocPath::new(collections::USERS, &user.user_name), patch)
        .await?;

    Ok(Json(json!({ "message": "Image uploaded successfully" })))
}

async fn serve_media(
    State(state): State<AppState>,
    Path(file): Path<String>,
) -> AppResult<impl IntoResponse> {
    // The uploads dir is flat; anything path-like is rejected.
    if file.contains('/') || file.contains('\\') || file.contains("..") {
        return Err(AppError::BadRequest("Invalid file name".into()));
    }

    let bytes = tokio::fs::read(state.uploads_dir.join(&file))
        .await
        .map_err(|_| AppError::NotFound)?;
    let mime = mime_guess::from_path(&file).first_or_octet_stream();

    Ok(([(header::CONTENT_TYPE, mime.to_string())], bytes))
}
