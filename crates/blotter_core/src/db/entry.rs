//! Entry storage operations backed by redb.
//!
//! `ENTRY_POSITIONS` mirrors each entry's `(post_id, index)` so that two
//! entries of one post can never be committed at the same index.

use super::helpers::{decode, encode, entry_not_found, next_id, post_not_found, touch_post};
use super::tables::{ENTRIES, ENTRY_POSITIONS, ENTRY_SEQUENCE, POSTS, SEQUENCES};
use crate::error::AppError;
use crate::models::entry::ContentEntry;
use crate::models::{EntryId, PostId};
use crate::store::IndexMove;
use chrono::Utc;
use redb::{ReadableDatabase, ReadableTable};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Accessor for entry rows and their position index.
pub struct EntryDb {
    db: Arc<redb::Database>,
}

fn index_taken(post_id: PostId, index: i64) -> AppError {
    AppError::Conflict(format!("index {} of post {} is already taken", index, post_id))
}

impl EntryDb {
    /// Initialize entry tables if they do not exist yet.
    ///
    /// # Errors
    /// Returns an error when redb transaction/table initialization fails.
    pub fn new(db: Arc<redb::Database>) -> Result<Self, AppError> {
        let write_txn = db.begin_write()?;
        write_txn.open_table(ENTRIES)?;
        write_txn.open_table(ENTRY_POSITIONS)?;
        write_txn.commit()?;
        Ok(Self { db })
    }

    /// Insert a new entry at `index`.
    ///
    /// # Errors
    /// [`AppError::NotFound`] when the post is missing, [`AppError::Conflict`]
    /// when the index is occupied.
    pub fn create(
        &self,
        post_id: PostId,
        index: i64,
        markdown: &str,
    ) -> Result<ContentEntry, AppError> {
        let write_txn = self.db.begin_write()?;
        let entry = {
            let mut posts = write_txn.open_table(POSTS)?;
            let mut entries = write_txn.open_table(ENTRIES)?;
            let mut positions = write_txn.open_table(ENTRY_POSITIONS)?;
            let mut sequences = write_txn.open_table(SEQUENCES)?;

            if posts.get(post_id)?.is_none() {
                return Err(post_not_found(post_id));
            }
            if positions.get((post_id, index))?.is_some() {
                return Err(index_taken(post_id, index));
            }

            let id = next_id(&mut sequences, ENTRY_SEQUENCE)?;
            let entry = ContentEntry::new(id, post_id, index, markdown.to_string());
            entries.insert(id, encode(&entry)?.as_slice())?;
            positions.insert((post_id, index), id)?;
            touch_post(&mut posts, post_id, entry.created_at)?;
            entry
        };
        write_txn.commit()?;
        tracing::debug!(entry_id = entry.id, post_id, index, "entry created");
        Ok(entry)
    }

    pub fn get(&self, id: EntryId) -> Result<Option<ContentEntry>, AppError> {
        let read_txn = self.db.begin_read()?;
        let entries = read_txn.open_table(ENTRIES)?;
        match entries.get(id)? {
            Some(guard) => Ok(Some(decode(guard.value())?)),
            None => Ok(None),
        }
    }

    pub fn exists(&self, id: EntryId) -> Result<bool, AppError> {
        let read_txn = self.db.begin_read()?;
        let entries = read_txn.open_table(ENTRIES)?;
        let exists = entries.get(id)?.is_some();
        Ok(exists)
    }

    /// Entries of a post in display order (ascending index).
    pub fn list_for_post(&self, post_id: PostId) -> Result<Vec<ContentEntry>, AppError> {
        let read_txn = self.db.begin_read()?;
        let positions = read_txn.open_table(ENTRY_POSITIONS)?;
        let entries = read_txn.open_table(ENTRIES)?;
        let mut ordered = Vec::new();
        for item in positions.range((post_id, i64::MIN)..=(post_id, i64::MAX))? {
            let (_, value) = item?;
            let entry_id = value.value();
            match entries.get(entry_id)? {
                Some(guard) => ordered.push(decode::<ContentEntry>(guard.value())?),
                None => tracing::warn!("Position index references missing entry {}", entry_id),
            }
        }
        Ok(ordered)
    }

    /// `(entry_id, index)` pairs of a post, ascending by index.
    pub fn indices(&self, post_id: PostId) -> Result<Vec<(EntryId, i64)>, AppError> {
        let read_txn = self.db.begin_read()?;
        let positions = read_txn.open_table(ENTRY_POSITIONS)?;
        let mut pairs = Vec::new();
        for item in positions.range((post_id, i64::MIN)..=(post_id, i64::MAX))? {
            let (key, value) = item?;
            pairs.push((value.value(), key.value().1));
        }
        Ok(pairs)
    }

    /// Replace an entry's markdown.
    ///
    /// # Errors
    /// [`AppError::NotFound`] when the entry is missing.
    pub fn update_markdown(&self, id: EntryId, markdown: &str) -> Result<ContentEntry, AppError> {
        let write_txn = self.db.begin_write()?;
        let entry = {
            let mut posts = write_txn.open_table(POSTS)?;
            let mut entries = write_txn.open_table(ENTRIES)?;
            let mut entry: ContentEntry = match entries.get(id)? {
                Some(guard) => decode(guard.value())?,
                None => return Err(entry_not_found(id)),
            };
            entry.markdown = markdown.to_string();
            entry.updated_at = Utc::now();
            entries.insert(id, encode(&entry)?.as_slice())?;
            touch_post(&mut posts, entry.post_id, entry.updated_at)?;
            entry
        };
        write_txn.commit()?;
        tracing::debug!(entry_id = id, "entry updated");
        Ok(entry)
    }

    /// Record stored file paths on an entry of `post_id`.
    ///
    /// Paths already recorded are skipped; order of first attachment is kept.
    ///
    /// # Errors
    /// [`AppError::NotFound`] when the entry is missing or belongs to another
    /// post.
    pub fn attach_files(
        &self,
        post_id: PostId,
        id: EntryId,
        paths: &[String],
    ) -> Result<ContentEntry, AppError> {
        let write_txn = self.db.begin_write()?;
        let entry = {
            let mut posts = write_txn.open_table(POSTS)?;
            let mut entries = write_txn.open_table(ENTRIES)?;
            let mut entry: ContentEntry = match entries.get(id)? {
                Some(guard) => decode(guard.value())?,
                None => return Err(entry_not_found(id)),
            };
            if entry.post_id != post_id {
                return Err(AppError::NotFound(format!("entry {} in post {}", id, post_id)));
            }
            for path in paths {
                if !entry.files.contains(path) {
                    entry.files.push(path.clone());
                }
            }
            entry.updated_at = Utc::now();
            entries.insert(id, encode(&entry)?.as_slice())?;
            touch_post(&mut posts, post_id, entry.updated_at)?;
            entry
        };
        write_txn.commit()?;
        tracing::debug!(entry_id = id, files = entry.files.len(), "entry files attached");
        Ok(entry)
    }

    /// Move a single entry to `index`.
    ///
    /// # Errors
    /// [`AppError::NotFound`] when the entry is missing, [`AppError::Conflict`]
    /// when another entry holds `index`.
    pub fn set_index(&self, id: EntryId, index: i64) -> Result<(), AppError> {
        let write_txn = self.db.begin_write()?;
        {
            let mut posts = write_txn.open_table(POSTS)?;
            let mut entries = write_txn.open_table(ENTRIES)?;
            let mut positions = write_txn.open_table(ENTRY_POSITIONS)?;
            let mut entry: ContentEntry = match entries.get(id)? {
                Some(guard) => decode(guard.value())?,
                None => return Err(entry_not_found(id)),
            };
            if entry.index == index {
                return Ok(());
            }
            if positions.get((entry.post_id, index))?.is_some() {
                return Err(index_taken(entry.post_id, index));
            }
            positions.remove((entry.post_id, entry.index))?;
            positions.insert((entry.post_id, index), id)?;
            entry.index = index;
            entry.updated_at = Utc::now();
            entries.insert(id, encode(&entry)?.as_slice())?;
            touch_post(&mut posts, entry.post_id, entry.updated_at)?;
        }
        write_txn.commit()?;
        tracing::debug!(entry_id = id, index, "entry index set");
        Ok(())
    }

    /// Apply a batch of index moves in one transaction.
    ///
    /// Every move must start from the entry's current index; a stale plan
    /// (moved or deleted entry) is reported as [`AppError::Conflict`] and
    /// nothing is written.
    pub fn apply_moves(&self, moves: &[IndexMove]) -> Result<(), AppError> {
        if moves.is_empty() {
            return Ok(());
        }
        let write_txn = self.db.begin_write()?;
        {
            let mut posts = write_txn.open_table(POSTS)?;
            let mut entries = write_txn.open_table(ENTRIES)?;
            let mut positions = write_txn.open_table(ENTRY_POSITIONS)?;
            let now = Utc::now();

            let mut staged = Vec::with_capacity(moves.len());
            for step in moves {
                let entry: ContentEntry = match entries.get(step.entry_id)? {
                    Some(guard) => decode(guard.value())?,
                    None => {
                        return Err(AppError::Conflict(format!(
                            "entry {} left the post after the plan was read",
                            step.entry_id
                        )))
                    }
                };
                if entry.index != step.from {
                    return Err(AppError::Conflict(format!(
                        "entry {} is at index {}, expected {}",
                        step.entry_id, entry.index, step.from
                    )));
                }
                staged.push(entry);
            }

            for entry in &staged {
                positions.remove((entry.post_id, entry.index))?;
            }
            let mut touched = BTreeSet::new();
            for (entry, step) in staged.iter_mut().zip(moves) {
                if positions.get((entry.post_id, step.to))?.is_some() {
                    return Err(index_taken(entry.post_id, step.to));
                }
                positions.insert((entry.post_id, step.to), entry.id)?;
                entry.index = step.to;
                entry.updated_at = now;
                entries.insert(entry.id, encode(&*entry)?.as_slice())?;
                touched.insert(entry.post_id);
            }
            for post_id in touched {
                touch_post(&mut posts, post_id, now)?;
            }
        }
        write_txn.commit()?;
        tracing::debug!(moves = moves.len(), "index moves applied");
        Ok(())
    }

    /// Remove an entry and its position.
    ///
    /// # Errors
    /// [`AppError::NotFound`] when the entry is missing.
    pub fn delete(&self, id: EntryId) -> Result<ContentEntry, AppError> {
        let write_txn = self.db.begin_write()?;
        let entry = {
            let mut posts = write_txn.open_table(POSTS)?;
            let mut entries = write_txn.open_table(ENTRIES)?;
            let mut positions = write_txn.open_table(ENTRY_POSITIONS)?;
            let entry: ContentEntry = match entries.remove(id)? {
                Some(guard) => decode(guard.value())?,
                None => return Err(entry_not_found(id)),
            };
            positions.remove((entry.post_id, entry.index))?;
            touch_post(&mut posts, entry.post_id, Utc::now())?;
            entry
        };
        write_txn.commit()?;
        tracing::debug!(entry_id = id, post_id = entry.post_id, "entry deleted");
        Ok(entry)
    }
}
