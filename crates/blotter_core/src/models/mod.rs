//! Data models for persistence and API payloads.

/// Draft slot state.
pub mod draft;
/// Content entry rows and payloads.
pub mod entry;
/// Post rows and payloads.
pub mod post;


/// Identifier of a post.
pub type PostId = u64;
/// Identifier of a content entry.
pub type EntryId = u64;
