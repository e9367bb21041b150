//! The single global draft slot and its commit decision.
//!
//! The machine is either idle (no post bound) or editing a bound post, where
//! `entry_id == None` means the text becomes a new entry on commit. Commit is
//! the only place a draft turns into a create, update, or delete.

use crate::error::AppError;
use crate::models::draft::DraftSlot;
use crate::models::{EntryId, PostId};
use crate::ordering::OrderingEngine;
use crate::store::{ContentStore, DraftPersistence};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};


/// What a commit does with the slot contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitAction {
    Noop,
    Create,
    Update(EntryId),
    Delete(EntryId),
}

impl CommitAction {
    /// Decide the commit action for a slot.
    ///
    /// Markdown is trimmed only to test for emptiness.
    pub fn decide(entry_id: Option<EntryId>, markdown: &str) -> Self {
        let empty = markdown.trim().is_empty();
        match (entry_id, empty) {
            (None, true) => Self::Noop,
            (None, false) => Self::Create,
            (Some(id), false) => Self::Update(id),
            (Some(id), true) => Self::Delete(id),
        }
    }
}

/// Result of a successful commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum CommitOutcome {
    Noop,
    Created { entry_id: EntryId, index: i64 },
    Updated { entry_id: EntryId },
    Deleted { entry_id: EntryId },
}

/// Owner of the one in-flight edit.
pub struct DraftMachine<S, P>
where
    S: ContentStore + ?Sized,
    P: DraftPersistence + ?Sized,
{
    ordering: OrderingEngine<S>,
    persistence: Arc<P>,
    slot: DraftSlot,
    persist_interval: Duration,
    last_persisted: Option<Instant>,
    dirty: bool,
}

fn not_bound() -> AppError {
    AppError::BadRequest("Draft is not bound to a post".to_string())
}

impl<S, P> DraftMachine<S, P>
where
    S: ContentStore + ?Sized,
    P: DraftPersistence + ?Sized,
{
    /// Create an idle machine.
    ///
    /// `persist_interval` bounds how often `set_markdown` rewrites the
    /// persisted copy.
    pub fn new(ordering: OrderingEngine<S>, persistence: Arc<P>, persist_interval: Duration) -> Self {
        Self {
            ordering,
            persistence,
            slot: DraftSlot::default(),
            persist_interval,
            last_persisted: None,
            dirty: false,
        }
    }

    /// Current slot contents.
    pub fn snapshot(&self) -> DraftSlot {
        self.slot.clone()
    }

    pub fn bound_post(&self) -> Option<PostId> {
        self.slot.post_id
    }

    /// Whether the slot has text not yet written to draft persistence.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Bind the slot to `post_id`.
    ///
    /// Binding the post already held is a no-op. Binding a different post
    /// commits the previous slot first; a previous post that no longer exists
    /// is logged and skipped. The new slot is restored from draft persistence
    /// when a copy was saved, otherwise it starts empty.
    ///
    /// # Errors
    /// [`AppError::NotFound`] when `post_id` does not exist (slot unchanged);
    /// any other error from committing the previous slot, in which case the
    /// previous slot is kept.
    pub fn bind_post(&mut self, post_id: PostId) -> Result<(), AppError> {
        if self.slot.post_id == Some(post_id) {
            return Ok(());
        }
        if !self.ordering.store().post_exists(post_id)? {
            return Err(AppError::NotFound(format!("post {}", post_id)));
        }

        if let Some(previous) = self.slot.post_id {
            match self.commit() {
                Ok(outcome) => {
                    tracing::debug!(post_id = previous, ?outcome, "committed draft before rebinding");
                }
                Err(err) if err.is_not_found() => {
                    tracing::warn!(
                        post_id = previous,
                        "Discarded draft of missing target while rebinding: {}",
                        err
                    );
                }
                Err(err) => return Err(err),
            }
        }

        self.slot = match self.persistence.load(post_id)? {
            Some(mut restored) => {
                tracing::info!(post_id, entry_id = ?restored.entry_id, "restored persisted draft");
                restored.post_id = Some(post_id);
                restored
            }
            None => DraftSlot::bound(post_id),
        };
        self.last_persisted = None;
        self.dirty = false;
        Ok(())
    }

    /// Start editing an existing entry with `markdown` as the initial text.
    ///
    /// # Errors
    /// [`AppError::BadRequest`] when no post is bound; [`AppError::NotFound`]
    /// when `entry_id` is not an entry of the bound post (slot unchanged);
    /// draft persistence errors.
    pub fn start_edit(&mut self, entry_id: EntryId, markdown: String) -> Result<(), AppError> {
        let post_id = self.slot.post_id.ok_or_else(not_bound)?;
        let owned = self
            .ordering
            .store()
            .list_entry_indices(post_id)?
            .iter()
            .any(|(id, _)| *id == entry_id);
        if !owned {
            return Err(AppError::NotFound(format!(
                "entry {} in post {}",
                entry_id, post_id
            )));
        }
        self.slot = DraftSlot {
            post_id: Some(post_id),
            entry_id: Some(entry_id),
            markdown,
        };
        self.persist_now()
    }

    /// Start a new, empty entry.
    ///
    /// # Errors
    /// [`AppError::BadRequest`] when no post is bound; draft persistence errors.
    pub fn start_new(&mut self) -> Result<(), AppError> {
        let post_id = self.slot.post_id.ok_or_else(not_bound)?;
        self.slot = DraftSlot::bound(post_id);
        self.persist_now()
    }

    /// Replace the slot text; the entry target is unchanged.
    ///
    /// The persisted copy is refreshed at most once per persist interval;
    /// in between, the slot is only marked dirty for [`Self::flush`].
    pub fn set_markdown(&mut self, markdown: String) -> Result<(), AppError> {
        if self.slot.post_id.is_none() {
            return Err(not_bound());
        }
        self.slot.markdown = markdown;
        let due = self
            .last_persisted
            .map_or(true, |at| at.elapsed() >= self.persist_interval);
        if due {
            self.persist_now()
        } else {
            self.dirty = true;
            Ok(())
        }
    }

    /// Persist a dirty slot immediately.
    ///
    /// # Returns
    /// `true` when a write happened.
    pub fn flush(&mut self) -> Result<bool, AppError> {
        if !self.dirty {
            return Ok(false);
        }
        self.persist_now()?;
        Ok(true)
    }

    /// Drop the in-flight edit without committing; the post stays bound.
    pub fn cancel(&mut self) -> Result<(), AppError> {
        let Some(post_id) = self.slot.post_id else {
            return Ok(());
        };
        self.slot.reset_edit();
        self.dirty = false;
        self.persistence.clear(post_id)
    }

    /// Turn the slot into a create, update, or delete.
    ///
    /// On success, and when the target turned out to be missing, the slot is
    /// reset (the post stays bound) and its persisted copy removed. Other
    /// errors leave the slot as it was.
    ///
    /// # Errors
    /// [`AppError::NotFound`] when the post or entry is gone; store errors.
    pub fn commit(&mut self) -> Result<CommitOutcome, AppError> {
        let Some(post_id) = self.slot.post_id else {
            return Ok(CommitOutcome::Noop);
        };
        let action = CommitAction::decide(self.slot.entry_id, &self.slot.markdown);
        let markdown = self.slot.markdown.as_str();
        let store = self.ordering.store();

        let result = match action {
            CommitAction::Noop => Ok(CommitOutcome::Noop),
            CommitAction::Create => self
                .ordering
                .insert(post_id, None, markdown)
                .map(|placement| CommitOutcome::Created {
                    entry_id: placement.entry_id,
                    index: placement.index,
                }),
            CommitAction::Update(entry_id) => self
                .ordering
                .locks()
                .lock(post_id)
                .and_then(|_guard| store.update_entry(entry_id, markdown))
                .map(|()| CommitOutcome::Updated { entry_id }),
            // Deleting frees an index; it must not interleave with a shift plan.
            CommitAction::Delete(entry_id) => self
                .ordering
                .locks()
                .lock(post_id)
                .and_then(|_guard| store.delete_entry(entry_id))
                .map(|()| CommitOutcome::Deleted { entry_id }),
        };

        match &result {
            Ok(outcome) => {
                if *outcome != CommitOutcome::Noop {
                    tracing::info!(post_id, ?outcome, "draft committed");
                }
                self.reset_after_commit(post_id);
            }
            Err(err) if err.is_not_found() => {
                tracing::warn!(post_id, "Draft target vanished, discarding edit: {}", err);
                self.reset_after_commit(post_id);
            }
            Err(err) => {
                tracing::error!(post_id, "Draft commit failed, keeping slot: {}", err);
            }
        }
        result
    }

    fn reset_after_commit(&mut self, post_id: PostId) {
        self.slot.reset_edit();
        self.dirty = false;
        if let Err(err) = self.persistence.clear(post_id) {
            tracing::warn!(post_id, "Failed to clear persisted draft: {}", err);
        }
    }

    fn persist_now(&mut self) -> Result<(), AppError> {
        let Some(post_id) = self.slot.post_id else {
            return Ok(());
        };
        self.persistence.save(post_id, &self.slot)?;
        self.last_persisted = Some(Instant::now());
        self.dirty = false;
        Ok(())
    }
}
