//! Bulk upload HTTP handler.

use super::run_blocking;
use crate::{error::HttpError, AppState};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use blotter_core::media::decode_payload;
use blotter_core::models::PostId;
use blotter_core::{AppError, UploadOutcome, UploadedFile};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct UploadFileRequest {
    pub name: String,
    /// File bytes as a data URL or bare base64.
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct UploadRequest {
    pub files: Vec<UploadFileRequest>,
}

/// Store a batch of files and append one entry listing them.
pub async fn upload_files(
    State(state): State<AppState>,
    Path(post_id): Path<PostId>,
    Json(req): Json<UploadRequest>,
) -> Result<(StatusCode, Json<UploadOutcome>), HttpError> {
    let max_size = state.config.max_payload_size;
    let files = req
        .files
        .into_iter()
        .map(|file| {
            decode_payload(&file.content, max_size).map(|payload| UploadedFile {
                name: file.name,
                bytes: payload.bytes,
            })
        })
        .collect::<Result<Vec<_>, AppError>>()?;

    let uploads = state.uploads.clone();
    let outcome = run_blocking(move || uploads.upload(post_id, &files)).await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}
