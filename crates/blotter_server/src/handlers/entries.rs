//! Entry HTTP handlers.

use super::run_blocking;
use crate::{error::HttpError, AppError, AppState};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use blotter_core::models::entry::{ContentEntry, EntryPlacement, InsertEntryRequest, MoveEntryRequest};
use blotter_core::models::{EntryId, PostId};

/// Insert an entry at `index`, or append when it is omitted.
pub async fn insert_entry(
    State(state): State<AppState>,
    Path(post_id): Path<PostId>,
    Json(req): Json<InsertEntryRequest>,
) -> Result<(StatusCode, Json<EntryPlacement>), HttpError> {
    let markdown = req.markdown.unwrap_or_default();
    let placement =
        run_blocking(move || state.ordering.insert(post_id, req.index, &markdown)).await?;
    Ok((StatusCode::CREATED, Json(placement)))
}

pub async fn get_entry(
    State(state): State<AppState>,
    Path(id): Path<EntryId>,
) -> Result<Json<ContentEntry>, HttpError> {
    state
        .db
        .entries
        .get(id)?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("entry {}", id)).into())
}

pub async fn move_entry(
    State(state): State<AppState>,
    Path(id): Path<EntryId>,
    Json(req): Json<MoveEntryRequest>,
) -> Result<Json<EntryPlacement>, HttpError> {
    let entry = state
        .db
        .entries
        .get(id)?
        .ok_or_else(|| AppError::NotFound(format!("entry {}", id)))?;
    let placement =
        run_blocking(move || state.ordering.reindex_for(entry.post_id, id, req.index)).await?;
    Ok(Json(placement))
}
