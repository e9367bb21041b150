//! Index assignment and reindexing for entries within a post.
//!
//! Every index-mutating sequence runs under the post's [`PostLockManager`]
//! guard: read the current `(entry_id, index)` pairs, stage the shift plan,
//! apply it through [`ContentStore::apply_index_moves`], then write the new or
//! moving entry. A [`AppError::Conflict`] anywhere in that sequence undoes the
//! staged moves and restarts from a fresh read.

use crate::constants::{FIRST_ENTRY_INDEX, MAX_REINDEX_ATTEMPTS};
use crate::error::AppError;
use crate::models::entry::EntryPlacement;
use crate::models::{EntryId, PostId};
use crate::post_locks::PostLockManager;
use crate::store::{ContentStore, IndexMove};
use std::sync::Arc;

#[cfg(test)]
mod tests;

/// Assigns and maintains entry indices through a [`ContentStore`].
pub struct OrderingEngine<S: ContentStore + ?Sized> {
    store: Arc<S>,
    locks: Arc<PostLockManager>,
}

impl<S: ContentStore + ?Sized> Clone for OrderingEngine<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            locks: self.locks.clone(),
        }
    }
}

/// Moves that shift every entry at or above `target` up by one, highest first.
///
/// Applying them in order never lands an entry on an index that is still held
/// by an entry not yet moved.
pub(crate) fn shift_plan(current: &[(EntryId, i64)], target: i64) -> Result<Vec<IndexMove>, AppError> {
    let mut plan = Vec::new();
    for &(entry_id, index) in current.iter().filter(|(_, index)| *index >= target) {
        plan.push(IndexMove {
            entry_id,
            from: index,
            to: bump(index)?,
        });
    }
    plan.sort_by(|a, b| b.from.cmp(&a.from));
    Ok(plan)
}

fn bump(index: i64) -> Result<i64, AppError> {
    index
        .checked_add(1)
        .ok_or_else(|| AppError::BadRequest(format!("index {} cannot be shifted", index)))
}

impl<S: ContentStore + ?Sized> OrderingEngine<S> {
    pub fn new(store: Arc<S>, locks: Arc<PostLockManager>) -> Self {
        Self { store, locks }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn locks(&self) -> &Arc<PostLockManager> {
        &self.locks
    }

    /// Create an entry in `post_id`, at `desired` or appended after the last one.
    ///
    /// An empty post always starts at index 1. With a `desired` position every
    /// entry at or above it moves up by one first.
    ///
    /// # Returns
    /// Where the new entry landed.
    ///
    /// # Errors
    /// [`AppError::NotFound`] when the post is missing; [`AppError::Conflict`]
    /// when the sequence still collides after [`MAX_REINDEX_ATTEMPTS`]; store
    /// errors are propagated unchanged.
    pub fn insert(
        &self,
        post_id: PostId,
        desired: Option<i64>,
        markdown: &str,
    ) -> Result<EntryPlacement, AppError> {
        let _guard = self.locks.lock(post_id)?;
        if !self.store.post_exists(post_id)? {
            return Err(AppError::NotFound(format!("post {}", post_id)));
        }
        let placement = self.with_retry(post_id, || self.try_insert(post_id, desired, markdown))?;
        tracing::debug!(
            post_id,
            entry_id = placement.entry_id,
            index = placement.index,
            "entry inserted"
        );
        Ok(placement)
    }

    /// Move `entry_id` to `new_index`, shifting entries at or above it.
    ///
    /// Moving an entry to the index it already holds writes nothing.
    ///
    /// # Errors
    /// [`AppError::NotFound`] when the post is missing or the entry is not
    /// part of it; otherwise as [`Self::insert`].
    pub fn reindex_for(
        &self,
        post_id: PostId,
        entry_id: EntryId,
        new_index: i64,
    ) -> Result<EntryPlacement, AppError> {
        let _guard = self.locks.lock(post_id)?;
        if !self.store.post_exists(post_id)? {
            return Err(AppError::NotFound(format!("post {}", post_id)));
        }
        let placement =
            self.with_retry(post_id, || self.try_reindex(post_id, entry_id, new_index))?;
        tracing::debug!(post_id, entry_id, index = new_index, "entry reindexed");
        Ok(placement)
    }

    fn with_retry<F>(&self, post_id: PostId, mut attempt_once: F) -> Result<EntryPlacement, AppError>
    where
        F: FnMut() -> Result<EntryPlacement, AppError>,
    {
        let mut attempt = 1;
        loop {
            match attempt_once() {
                Err(err) if err.is_conflict() && attempt < MAX_REINDEX_ATTEMPTS => {
                    tracing::warn!(post_id, attempt, "index conflict, retrying: {}", err);
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    fn try_insert(
        &self,
        post_id: PostId,
        desired: Option<i64>,
        markdown: &str,
    ) -> Result<EntryPlacement, AppError> {
        let current = self.store.list_entry_indices(post_id)?;
        let index = match (current.last(), desired) {
            (None, _) => FIRST_ENTRY_INDEX,
            (Some(&(_, max)), None) => bump(max)?,
            (Some(_), Some(position)) => position,
        };

        let plan = shift_plan(&current, index)?;
        self.store.apply_index_moves(&plan)?;
        match self.store.create_entry(post_id, index, markdown) {
            Ok(entry_id) => Ok(EntryPlacement { entry_id, index }),
            Err(err) => {
                self.undo(&plan);
                Err(err)
            }
        }
    }

    fn try_reindex(
        &self,
        post_id: PostId,
        entry_id: EntryId,
        new_index: i64,
    ) -> Result<EntryPlacement, AppError> {
        let current = self.store.list_entry_indices(post_id)?;
        let Some(&(_, from)) = current.iter().find(|(id, _)| *id == entry_id) else {
            return Err(AppError::NotFound(format!(
                "entry {} in post {}",
                entry_id, post_id
            )));
        };
        let placement = EntryPlacement {
            entry_id,
            index: new_index,
        };
        if from == new_index {
            return Ok(placement);
        }

        // The mover is shifted with the rest when it sits at or above the
        // target, so its old slot never blocks the chain.
        let plan = shift_plan(&current, new_index)?;
        self.store.apply_index_moves(&plan)?;
        if let Err(err) = self.store.update_entry_index(entry_id, new_index) {
            self.undo(&plan);
            return Err(err);
        }
        Ok(placement)
    }

    fn undo(&self, plan: &[IndexMove]) {
        if plan.is_empty() {
            return;
        }
        let inverse: Vec<IndexMove> = plan.iter().rev().map(IndexMove::inverse).collect();
        if let Err(err) = self.store.apply_index_moves(&inverse) {
            tracing::error!("Failed to undo staged index moves: {}", err);
        }
    }
}
