//! Row encoding and shared in-transaction helpers.

use crate::error::AppError;
use crate::models::post::Post;
use crate::models::PostId;
use chrono::{DateTime, Utc};
use redb::ReadableTable;
use serde::{de::DeserializeOwned, Serialize};

pub(super) fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, AppError> {
    Ok(bincode::serialize(value)?)
}

pub(super) fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, AppError> {
    Ok(bincode::deserialize(bytes)?)
}

pub(super) fn next_id(
    sequences: &mut redb::Table<&'static str, u64>,
    name: &str,
) -> Result<u64, AppError> {
    let current = sequences.get(name)?.map(|guard| guard.value()).unwrap_or(0);
    let next = current.checked_add(1).ok_or_else(|| {
        AppError::StorageMessage(format!("Id sequence '{}' is exhausted", name))
    })?;
    sequences.insert(name, next)?;
    Ok(next)
}

pub(super) fn load_post<T>(posts: &T, post_id: PostId) -> Result<Option<Post>, AppError>
where
    T: ReadableTable<u64, &'static [u8]>,
{
    let Some(guard) = posts.get(post_id)? else {
        return Ok(None);
    };
    Ok(Some(decode(guard.value())?))
}

/// Bump `updated_at` of the owning post inside the caller's transaction.
///
/// A missing post is ignored; entry writes already validated ownership.
pub(super) fn touch_post(
    posts: &mut redb::Table<u64, &'static [u8]>,
    post_id: PostId,
    now: DateTime<Utc>,
) -> Result<(), AppError> {
    let Some(mut post) = load_post(&*posts, post_id)? else {
        return Ok(());
    };
    post.updated_at = now;
    posts.insert(post_id, encode(&post)?.as_slice())?;
    Ok(())
}

pub(super) fn post_not_found(post_id: PostId) -> AppError {
    AppError::NotFound(format!("post {}", post_id))
}

pub(super) fn entry_not_found(entry_id: u64) -> AppError {
    AppError::NotFound(format!("entry {}", entry_id))
}
