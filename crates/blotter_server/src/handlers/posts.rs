//! Post HTTP handlers.

use super::run_blocking;
use crate::{error::HttpError, AppError, AppState};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use blotter_core::models::post::{CreatePostRequest, Post, PostWithEntries, UpdatePostRequest};
use blotter_core::models::PostId;
use serde_json::{json, Value};

pub async fn create_post(
    State(state): State<AppState>,
    Json(req): Json<CreatePostRequest>,
) -> Result<(StatusCode, Json<Post>), HttpError> {
    let post = state.db.posts.create(req.title)?;
    Ok((StatusCode::CREATED, Json(post)))
}

pub async fn list_posts(State(state): State<AppState>) -> Result<Json<Vec<Post>>, HttpError> {
    Ok(Json(state.db.posts.list()?))
}

/// Post with its entries in index order.
pub async fn get_post(
    State(state): State<AppState>,
    Path(id): Path<PostId>,
) -> Result<Json<PostWithEntries>, HttpError> {
    let post = state
        .db
        .posts
        .get(id)?
        .ok_or_else(|| AppError::NotFound(format!("post {}", id)))?;
    let entries = state.db.entries.list_for_post(id)?;
    Ok(Json(PostWithEntries { post, entries }))
}

pub async fn update_post(
    State(state): State<AppState>,
    Path(id): Path<PostId>,
    Json(req): Json<UpdatePostRequest>,
) -> Result<Json<Post>, HttpError> {
    state
        .db
        .posts
        .rename(id, &req.title)?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("post {}", id)).into())
}

/// Delete a post and its entries.
///
/// Holds the post's lock so no insert or reindex interleaves with the cascade.
pub async fn delete_post(
    State(state): State<AppState>,
    Path(id): Path<PostId>,
) -> Result<Json<Value>, HttpError> {
    let deleted = run_blocking(move || {
        let _guard = state.locks.lock(id)?;
        state.db.posts.delete(id)
    })
    .await?;
    if !deleted {
        return Err(AppError::NotFound(format!("post {}", id)).into());
    }
    Ok(Json(json!({ "success": true })))
}
