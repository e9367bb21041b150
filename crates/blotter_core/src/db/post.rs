//! Post storage operations backed by redb.

use super::helpers::{decode, encode, load_post, next_id};
use super::tables::{DRAFTS, ENTRIES, ENTRY_POSITIONS, POSTS, POST_SEQUENCE, SEQUENCES};
use crate::constants::{MAX_TITLE_CHARS, MIN_TITLE_CHARS};
use crate::error::AppError;
use crate::models::post::Post;
use crate::models::PostId;
use redb::{ReadableDatabase, ReadableTable};
use std::sync::Arc;

/// Accessor for the post table.
pub struct PostDb {
    db: Arc<redb::Database>,
}

impl PostDb {
    /// Initialize post tables if they do not exist yet.
    ///
    /// # Errors
    /// Returns an error when redb transaction/table initialization fails.
    pub fn new(db: Arc<redb::Database>) -> Result<Self, AppError> {
        let write_txn = db.begin_write()?;
        write_txn.open_table(POSTS)?;
        write_txn.open_table(SEQUENCES)?;
        write_txn.commit()?;
        Ok(Self { db })
    }

    /// Create a post, allocating its id.
    ///
    /// # Returns
    /// The persisted [`Post`].
    ///
    /// # Errors
    /// Returns an error when serialization or storage fails.
    pub fn create(&self, title: Option<String>) -> Result<Post, AppError> {
        let write_txn = self.db.begin_write()?;
        let post = {
            let mut posts = write_txn.open_table(POSTS)?;
            let mut sequences = write_txn.open_table(SEQUENCES)?;
            let id = next_id(&mut sequences, POST_SEQUENCE)?;
            let post = Post::new(id, title);
            posts.insert(id, encode(&post)?.as_slice())?;
            post
        };
        write_txn.commit()?;
        tracing::info!(post_id = post.id, slug = %post.slug, "post created");
        Ok(post)
    }

    /// Fetch a post by id.
    ///
    /// # Returns
    /// `Ok(Some(post))` when found, `Ok(None)` when missing.
    pub fn get(&self, id: PostId) -> Result<Option<Post>, AppError> {
        let read_txn = self.db.begin_read()?;
        let posts = read_txn.open_table(POSTS)?;
        load_post(&posts, id)
    }

    pub fn exists(&self, id: PostId) -> Result<bool, AppError> {
        let read_txn = self.db.begin_read()?;
        let posts = read_txn.open_table(POSTS)?;
        let exists = posts.get(id)?.is_some();
        Ok(exists)
    }

    /// List all posts, most recently updated first.
    pub fn list(&self) -> Result<Vec<Post>, AppError> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(POSTS)?;
        let mut posts = Vec::new();
        for item in table.iter()? {
            let (_, value) = item?;
            posts.push(decode::<Post>(value.value())?);
        }
        posts.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then_with(|| b.id.cmp(&a.id)));
        Ok(posts)
    }

    /// Change a post's title (and slug).
    ///
    /// # Returns
    /// `Ok(Some(post))` when updated, `Ok(None)` when missing.
    ///
    /// # Errors
    /// Returns [`AppError::BadRequest`] unless the trimmed title has
    /// [`MIN_TITLE_CHARS`]..=[`MAX_TITLE_CHARS`] characters, or storage errors.
    pub fn rename(&self, id: PostId, title: &str) -> Result<Option<Post>, AppError> {
        let length = title.trim().chars().count();
        if !(MIN_TITLE_CHARS..=MAX_TITLE_CHARS).contains(&length) {
            return Err(AppError::BadRequest(format!(
                "Post title must be {} to {} characters, got {}",
                MIN_TITLE_CHARS, MAX_TITLE_CHARS, length
            )));
        }
        let write_txn = self.db.begin_write()?;
        let renamed = {
            let mut posts = write_txn.open_table(POSTS)?;
            let Some(mut post) = load_post(&posts, id)? else {
                return Ok(None);
            };
            post.rename(title);
            posts.insert(id, encode(&post)?.as_slice())?;
            post
        };
        write_txn.commit()?;
        Ok(Some(renamed))
    }

    /// Delete a post together with its entries and persisted draft.
    ///
    /// Captured media files stay on disk; entries only reference them by path.
    ///
    /// # Returns
    /// `true` when a post was deleted, `false` when it did not exist.
    pub fn delete(&self, id: PostId) -> Result<bool, AppError> {
        let write_txn = self.db.begin_write()?;
        let removed_entries = {
            let mut posts = write_txn.open_table(POSTS)?;
            let mut entries = write_txn.open_table(ENTRIES)?;
            let mut positions = write_txn.open_table(ENTRY_POSITIONS)?;
            let mut drafts = write_txn.open_table(DRAFTS)?;

            if posts.remove(id)?.is_none() {
                return Ok(false);
            }

            let mut owned = Vec::new();
            for item in positions.range((id, i64::MIN)..=(id, i64::MAX))? {
                let (key, value) = item?;
                owned.push((key.value().1, value.value()));
            }
            for (index, entry_id) in &owned {
                positions.remove((id, *index))?;
                entries.remove(*entry_id)?;
            }
            drafts.remove(id)?;
            owned.len()
        };
        write_txn.commit()?;
        tracing::info!(post_id = id, removed_entries, "post deleted");
        Ok(true)
    }
}
