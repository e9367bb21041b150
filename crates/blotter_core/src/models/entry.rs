//! Content entry models.

use super::{EntryId, PostId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One ordered unit of markdown content within a post.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContentEntry {
    pub id: EntryId,
    pub post_id: PostId,
    pub index: i64,
    pub markdown: String,
    /// Asset paths recorded on this entry by uploads and linked captures.
    #[serde(default)]
    pub files: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ContentEntry {
    pub fn new(id: EntryId, post_id: PostId, index: i64, markdown: String) -> Self {
        let now = Utc::now();
        Self {
            id,
            post_id,
            index,
            markdown,
            files: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Request payload for inserting an entry at an optional position.
#[derive(Debug, Default, Deserialize)]
pub struct InsertEntryRequest {
    pub index: Option<i64>,
    pub markdown: Option<String>,
}

/// Response payload describing where an entry landed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct EntryPlacement {
    pub entry_id: EntryId,
    pub index: i64,
}

/// Request payload for moving an entry.
#[derive(Debug, Deserialize)]
pub struct MoveEntryRequest {
    pub index: i64,
}
