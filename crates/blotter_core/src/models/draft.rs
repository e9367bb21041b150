//! Draft slot models.

use super::{EntryId, PostId};
use serde::{Deserialize, Serialize};

/// The single in-progress edit.
///
/// `post_id == None` means idle; `entry_id == None` means the text will become
/// a new entry on commit.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DraftSlot {
    pub post_id: Option<PostId>,
    pub entry_id: Option<EntryId>,
    pub markdown: String,
}

impl DraftSlot {
    /// An empty slot bound to `post_id`.
    pub fn bound(post_id: PostId) -> Self {
        Self {
            post_id: Some(post_id),
            entry_id: None,
            markdown: String::new(),
        }
    }

    pub fn is_idle(&self) -> bool {
        self.post_id.is_none()
    }

    /// Forget the edit but stay bound to the post.
    pub fn reset_edit(&mut self) {
        self.entry_id = None;
        self.markdown.clear();
    }
}

/// Request payload for binding the draft to a post.
#[derive(Debug, Deserialize)]
pub struct BindDraftRequest {
    pub post_id: PostId,
}

/// Request payload for editing an existing entry.
#[derive(Debug, Deserialize)]
pub struct StartEditRequest {
    pub entry_id: EntryId,
    pub markdown: String,
}

/// Request payload carrying the latest editor text.
#[derive(Debug, Deserialize)]
pub struct SetMarkdownRequest {
    pub markdown: String,
}
