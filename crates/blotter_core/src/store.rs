//! Storage contracts consumed by the ordering engine and the draft machine.
//!
//! Every method is a single atomic record operation. Multi-step sequences
//! (reindexing) are composed by [`crate::OrderingEngine`] under a per-post lock.

use crate::error::AppError;
use crate::models::draft::DraftSlot;
use crate::models::{EntryId, PostId};

/// One staged change of an entry's index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexMove {
    pub entry_id: EntryId,
    pub from: i64,
    pub to: i64,
}

impl IndexMove {
    /// The move that undoes this one.
    pub fn inverse(&self) -> Self {
        Self {
            entry_id: self.entry_id,
            from: self.to,
            to: self.from,
        }
    }
}

/// Durable record storage for posts and entries.
pub trait ContentStore: Send + Sync {
    /// Create an entry at `index`.
    ///
    /// # Errors
    /// [`AppError::NotFound`] when the post is missing, [`AppError::Conflict`]
    /// when `index` is already taken within the post.
    fn create_entry(&self, post_id: PostId, index: i64, markdown: &str)
        -> Result<EntryId, AppError>;

    /// Replace an entry's markdown.
    ///
    /// # Errors
    /// [`AppError::NotFound`] when the entry is missing.
    fn update_entry(&self, entry_id: EntryId, markdown: &str) -> Result<(), AppError>;

    /// Remove an entry.
    ///
    /// # Errors
    /// [`AppError::NotFound`] when the entry is missing.
    fn delete_entry(&self, entry_id: EntryId) -> Result<(), AppError>;

    /// Move one entry to `index`.
    ///
    /// # Errors
    /// [`AppError::NotFound`] when the entry is missing, [`AppError::Conflict`]
    /// when another entry of the same post holds `index`.
    fn update_entry_index(&self, entry_id: EntryId, index: i64) -> Result<(), AppError>;

    /// Record stored file paths on an entry, skipping ones already recorded.
    ///
    /// # Errors
    /// [`AppError::NotFound`] when the entry is missing or not part of
    /// `post_id`.
    fn attach_files(&self, post_id: PostId, entry_id: EntryId, paths: &[String])
        -> Result<(), AppError>;

    /// All `(entry_id, index)` pairs of a post, ascending by index.
    fn list_entry_indices(&self, post_id: PostId) -> Result<Vec<(EntryId, i64)>, AppError>;

    fn entry_exists(&self, entry_id: EntryId) -> Result<bool, AppError>;

    fn post_exists(&self, post_id: PostId) -> Result<bool, AppError>;

    /// Apply a staged list of index moves in the given order.
    ///
    /// The default applies one record at a time and, on failure, walks the
    /// already-applied moves back in reverse before returning the error. An
    /// entry that vanished since the plan was read is a [`AppError::Conflict`].
    /// Stores with batched writes should override this with a single atomic
    /// write.
    fn apply_index_moves(&self, moves: &[IndexMove]) -> Result<(), AppError> {
        for (applied, step) in moves.iter().enumerate() {
            if let Err(err) = self.update_entry_index(step.entry_id, step.to) {
                let err = if err.is_not_found() {
                    AppError::Conflict(format!(
                        "entry {} left the post after the plan was read",
                        step.entry_id
                    ))
                } else {
                    err
                };
                for undo in moves[..applied].iter().rev() {
                    if let Err(rollback_err) = self.update_entry_index(undo.entry_id, undo.from) {
                        tracing::error!(
                            "Failed to roll back index move of entry {}: {}",
                            undo.entry_id,
                            rollback_err
                        );
                    }
                }
                return Err(err);
            }
        }
        Ok(())
    }
}

/// Key-value draft storage that survives a process restart.
pub trait DraftPersistence: Send + Sync {
    fn load(&self, post_id: PostId) -> Result<Option<DraftSlot>, AppError>;

    fn save(&self, post_id: PostId, slot: &DraftSlot) -> Result<(), AppError>;

    fn clear(&self, post_id: PostId) -> Result<(), AppError>;
}
