//! Draft slot HTTP handlers.
//!
//! Each handler takes the draft machine lock for the duration of one
//! transition, on the blocking pool: transitions persist the slot and a
//! commit may wait on the post lock.

use super::run_blocking;
use crate::{error::HttpError, AppState, Drafts};
use axum::{extract::State, Json};
use blotter_core::models::draft::{
    BindDraftRequest, DraftSlot, SetMarkdownRequest, StartEditRequest,
};
use blotter_core::{AppError, CommitOutcome};

async fn transition<F>(state: AppState, step: F) -> Result<Json<DraftSlot>, HttpError>
where
    F: FnOnce(&mut Drafts) -> Result<(), AppError> + Send + 'static,
{
    let slot = run_blocking(move || {
        let mut drafts = state.lock_drafts()?;
        step(&mut drafts)?;
        Ok(drafts.snapshot())
    })
    .await?;
    Ok(Json(slot))
}

pub async fn get_draft(State(state): State<AppState>) -> Result<Json<DraftSlot>, HttpError> {
    let drafts = state.lock_drafts()?;
    Ok(Json(drafts.snapshot()))
}

pub async fn bind_post(
    State(state): State<AppState>,
    Json(req): Json<BindDraftRequest>,
) -> Result<Json<DraftSlot>, HttpError> {
    transition(state, move |drafts| drafts.bind_post(req.post_id)).await
}

pub async fn start_edit(
    State(state): State<AppState>,
    Json(req): Json<StartEditRequest>,
) -> Result<Json<DraftSlot>, HttpError> {
    transition(state, move |drafts| drafts.start_edit(req.entry_id, req.markdown)).await
}

pub async fn start_new(State(state): State<AppState>) -> Result<Json<DraftSlot>, HttpError> {
    transition(state, |drafts| drafts.start_new()).await
}

pub async fn set_markdown(
    State(state): State<AppState>,
    Json(req): Json<SetMarkdownRequest>,
) -> Result<Json<DraftSlot>, HttpError> {
    transition(state, move |drafts| drafts.set_markdown(req.markdown)).await
}

pub async fn commit(State(state): State<AppState>) -> Result<Json<CommitOutcome>, HttpError> {
    let outcome = run_blocking(move || state.lock_drafts()?.commit()).await?;
    Ok(Json(outcome))
}

pub async fn cancel(State(state): State<AppState>) -> Result<Json<DraftSlot>, HttpError> {
    transition(state, |drafts| drafts.cancel()).await
}
