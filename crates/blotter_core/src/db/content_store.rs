//! [`ContentStore`] and [`DraftPersistence`] for the redb-backed [`Database`].

use super::Database;
use crate::error::AppError;
use crate::models::draft::DraftSlot;
use crate::models::{EntryId, PostId};
use crate::store::{ContentStore, DraftPersistence, IndexMove};

impl ContentStore for Database {
    fn create_entry(
        &self,
        post_id: PostId,
        index: i64,
        markdown: &str,
    ) -> Result<EntryId, AppError> {
        self.entries
            .create(post_id, index, markdown)
            .map(|entry| entry.id)
    }

    fn update_entry(&self, entry_id: EntryId, markdown: &str) -> Result<(), AppError> {
        self.entries.update_markdown(entry_id, markdown).map(|_| ())
    }

    fn delete_entry(&self, entry_id: EntryId) -> Result<(), AppError> {
        self.entries.delete(entry_id).map(|_| ())
    }

    fn update_entry_index(&self, entry_id: EntryId, index: i64) -> Result<(), AppError> {
        self.entries.set_index(entry_id, index)
    }

    fn attach_files(
        &self,
        post_id: PostId,
        entry_id: EntryId,
        paths: &[String],
    ) -> Result<(), AppError> {
        self.entries
            .attach_files(post_id, entry_id, paths)
            .map(|_| ())
    }

    fn list_entry_indices(&self, post_id: PostId) -> Result<Vec<(EntryId, i64)>, AppError> {
        self.entries.indices(post_id)
    }

    fn entry_exists(&self, entry_id: EntryId) -> Result<bool, AppError> {
        self.entries.exists(entry_id)
    }

    fn post_exists(&self, post_id: PostId) -> Result<bool, AppError> {
        self.posts.exists(post_id)
    }

    // Whole plan lands in one redb transaction; nothing to roll back on error.
    fn apply_index_moves(&self, moves: &[IndexMove]) -> Result<(), AppError> {
        self.entries.apply_moves(moves)
    }
}

impl DraftPersistence for Database {
    fn load(&self, post_id: PostId) -> Result<Option<DraftSlot>, AppError> {
        self.drafts.load(post_id)
    }

    fn save(&self, post_id: PostId, slot: &DraftSlot) -> Result<(), AppError> {
        self.drafts.save(post_id, slot)
    }

    fn clear(&self, post_id: PostId) -> Result<(), AppError> {
        self.drafts.clear(post_id)
    }
}
