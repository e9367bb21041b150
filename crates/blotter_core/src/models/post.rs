//! Post models and slug derivation.

use super::entry::ContentEntry;
use super::PostId;
use crate::constants::DEFAULT_POST_TITLE;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Top-level authored document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Post {
    pub id: PostId,
    pub title: String,
    pub slug: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A post together with its entries in index order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostWithEntries {
    #[serde(flatten)]
    pub post: Post,
    pub entries: Vec<ContentEntry>,
}

/// Request payload for creating a post.
#[derive(Debug, Default, Deserialize)]
pub struct CreatePostRequest {
    pub title: Option<String>,
}

/// Request payload for renaming a post.
#[derive(Debug, Deserialize)]
pub struct UpdatePostRequest {
    pub title: String,
}

impl Post {
    /// Build a new post row; the id is assigned by the store.
    pub fn new(id: PostId, title: Option<String>) -> Self {
        let now = Utc::now();
        let title = title
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_POST_TITLE.to_string());
        Self {
            id,
            slug: slugify(&title),
            title,
            created_at: now,
            updated_at: now,
        }
    }

    /// Replace the title and re-derive the slug.
    pub fn rename(&mut self, title: &str) {
        self.title = title.trim().to_string();
        self.slug = slugify(&self.title);
        self.updated_at = Utc::now();
    }
}

/// Derive a URL slug from a title.
///
/// Whitespace runs become a single `-`, the result is lowercased, and anything
/// outside `[0-9a-z_-]` is dropped.
pub fn slugify(title: &str) -> String {
    title
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_digit() || c.is_ascii_lowercase() || *c == '_' || *c == '-')
        .collect()
}
