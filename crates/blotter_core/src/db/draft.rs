//! Persisted draft slots, one per post.

use super::helpers::{decode, encode};
use super::tables::DRAFTS;
use crate::error::AppError;
use crate::models::draft::DraftSlot;
use crate::models::PostId;
use redb::ReadableDatabase;
use std::sync::Arc;

pub struct DraftDb {
    db: Arc<redb::Database>,
}

impl DraftDb {
    /// Initialize the draft table if it does not exist yet.
    ///
    /// # Errors
    /// Returns an error when redb transaction/table initialization fails.
    pub fn new(db: Arc<redb::Database>) -> Result<Self, AppError> {
        let write_txn = db.begin_write()?;
        write_txn.open_table(DRAFTS)?;
        write_txn.commit()?;
        Ok(Self { db })
    }

    pub fn load(&self, post_id: PostId) -> Result<Option<DraftSlot>, AppError> {
        let read_txn = self.db.begin_read()?;
        let drafts = read_txn.open_table(DRAFTS)?;
        match drafts.get(post_id)? {
            Some(guard) => Ok(Some(decode(guard.value())?)),
            None => Ok(None),
        }
    }

    pub fn save(&self, post_id: PostId, slot: &DraftSlot) -> Result<(), AppError> {
        let bytes = encode(slot)?;
        let write_txn = self.db.begin_write()?;
        {
            let mut drafts = write_txn.open_table(DRAFTS)?;
            drafts.insert(post_id, bytes.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    pub fn clear(&self, post_id: PostId) -> Result<(), AppError> {
        let write_txn = self.db.begin_write()?;
        {
            let mut drafts = write_txn.open_table(DRAFTS)?;
            drafts.remove(post_id)?;
        }
        write_txn.commit()?;
        Ok(())
    }
}
