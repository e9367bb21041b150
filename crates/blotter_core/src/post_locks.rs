//! Per-post critical sections for entry index mutations.

use crate::error::AppError;
use crate::models::PostId;
use std::collections::HashSet;
use std::sync::{Condvar, Mutex, MutexGuard};

/// Hands out one exclusive section per post id.
///
/// Sections for different posts never block each other.
#[derive(Default)]
pub struct PostLockManager {
    busy: Mutex<HashSet<PostId>>,
    released: Condvar,
}

/// Guard proving the caller holds the index lock for one post.
///
/// The section is released when the guard drops.
pub struct PostTxnGuard<'a> {
    manager: &'a PostLockManager,
    post_id: PostId,
}

impl PostTxnGuard<'_> {
    pub fn post_id(&self) -> PostId {
        self.post_id
    }
}

impl Drop for PostTxnGuard<'_> {
    fn drop(&mut self) {
        let mut busy = match self.manager.busy.lock() {
            Ok(busy) => busy,
            Err(poisoned) => {
                tracing::error!(
                    "Post lock manager poisoned while releasing post {}; recovering",
                    self.post_id
                );
                poisoned.into_inner()
            }
        };
        busy.remove(&self.post_id);
        drop(busy);
        self.manager.released.notify_all();
    }
}

impl PostLockManager {
    fn state(&self) -> Result<MutexGuard<'_, HashSet<PostId>>, AppError> {
        self.busy
            .lock()
            .map_err(|_| AppError::StorageMessage("Post lock manager poisoned".to_string()))
    }

    /// Block until the section for `post_id` is free, then take it.
    ///
    /// # Errors
    /// Returns [`AppError::StorageMessage`] when lock state is poisoned.
    pub fn lock(&self, post_id: PostId) -> Result<PostTxnGuard<'_>, AppError> {
        let mut busy = self.state()?;
        while busy.contains(&post_id) {
            busy = self
                .released
                .wait(busy)
                .map_err(|_| AppError::StorageMessage("Post lock manager poisoned".to_string()))?;
        }
        busy.insert(post_id);
        Ok(PostTxnGuard {
            manager: self,
            post_id,
        })
    }

    /// Take the section for `post_id` only if nobody holds it.
    ///
    /// # Returns
    /// `Ok(None)` when another caller holds the section.
    pub fn try_lock(&self, post_id: PostId) -> Result<Option<PostTxnGuard<'_>>, AppError> {
        let mut busy = self.state()?;
        if !busy.insert(post_id) {
            return Ok(None);
        }
        Ok(Some(PostTxnGuard {
            manager: self,
            post_id,
        }))
    }

    pub fn is_locked(&self, post_id: PostId) -> Result<bool, AppError> {
        Ok(self.state()?.contains(&post_id))
    }
}
