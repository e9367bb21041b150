//! Shared constants used across Blotter crates.

/// Default API port for Blotter.
pub const DEFAULT_PORT: u16 = 38520;

/// Default maximum decoded size of a pasted media payload.
pub const DEFAULT_MAX_PAYLOAD_SIZE: usize = 25 * 1024 * 1024;

/// Default delay between persisted draft refreshes, in milliseconds.
pub const DEFAULT_DRAFT_PERSIST_INTERVAL_MS: u64 = 2_000;

/// Index assigned to the first entry of an empty post.
pub const FIRST_ENTRY_INDEX: i64 = 1;

/// Attempts made for a reindex sequence that keeps hitting position conflicts.
pub const MAX_REINDEX_ATTEMPTS: usize = 3;

/// Length bounds, in characters, for a post title set by a rename.
pub const MIN_TITLE_CHARS: usize = 3;
pub const MAX_TITLE_CHARS: usize = 80;

/// Title given to posts created without one.
pub const DEFAULT_POST_TITLE: &str = "Untitled";

/// URL prefix under which captured media is served.
pub const CAPTURE_ROUTE_PREFIX: &str = "capture";
