//! Media capture HTTP handler.

use super::run_blocking;
use crate::{error::HttpError, AppError, AppState};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use blotter_core::models::{EntryId, PostId};
use blotter_core::MediaAsset;
use serde::{Deserialize, Serialize};

/// A pasted payload: data URL or bare base64.
#[derive(Debug, Deserialize)]
pub struct CaptureRequest {
    pub payload: String,
    /// Entry of the post that should record the stored path in its `files`.
    #[serde(default)]
    pub entry_id: Option<EntryId>,
}

/// Stored asset plus the markdown that embeds it.
#[derive(Debug, Serialize)]
pub struct CaptureResponse {
    #[serde(flatten)]
    pub asset: MediaAsset,
    pub markdown: String,
}

/// Ingest a pasted payload for a post.
///
/// Runs on the blocking pool: detection and transcoding shell out. When an
/// entry is named, it must belong to the post; an asset that cannot be
/// recorded on it is removed again.
pub async fn capture_media(
    State(state): State<AppState>,
    Path(post_id): Path<PostId>,
    Json(req): Json<CaptureRequest>,
) -> Result<(StatusCode, Json<CaptureResponse>), HttpError> {
    if !state.db.posts.exists(post_id)? {
        return Err(AppError::NotFound(format!("post {}", post_id)).into());
    }
    if let Some(entry_id) = req.entry_id {
        let owned = state
            .db
            .entries
            .get(entry_id)?
            .is_some_and(|entry| entry.post_id == post_id);
        if !owned {
            return Err(
                AppError::NotFound(format!("entry {} in post {}", entry_id, post_id)).into(),
            );
        }
    }

    let media = state.media.clone();
    let db = state.db.clone();
    let asset = run_blocking(move || {
        let asset = media.ingest(post_id, &req.payload)?;
        let Some(entry_id) = req.entry_id else {
            return Ok(asset);
        };
        if let Err(err) = db
            .entries
            .attach_files(post_id, entry_id, std::slice::from_ref(&asset.path))
        {
            for path in std::iter::once(&asset.path).chain(asset.preview_path.as_ref()) {
                if let Err(cleanup_err) = media.blobs().delete_file(path) {
                    tracing::warn!("Failed to remove unrecorded asset {}: {}", path, cleanup_err);
                }
            }
            return Err(err);
        }
        Ok(asset)
    })
    .await?;

    let markdown = asset.markdown_snippet(&state.config.public_base_url);
    Ok((StatusCode::CREATED, Json(CaptureResponse { asset, markdown })))
}
