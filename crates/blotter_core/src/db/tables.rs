//! redb table definitions shared by storage modules.

use redb::TableDefinition;

/// File name for the redb database within the configured DB directory.
pub const REDB_FILE_NAME: &str = "data.redb";

/// Canonical post rows (`Post`, bincode-encoded).
pub const POSTS: TableDefinition<u64, &[u8]> = TableDefinition::new("posts");
/// Canonical entry rows (`ContentEntry`, bincode-encoded).
pub const ENTRIES: TableDefinition<u64, &[u8]> = TableDefinition::new("entries");
/// Position index `(post_id, index) -> entry_id`; one row per occupied index.
pub const ENTRY_POSITIONS: TableDefinition<(u64, i64), u64> =
    TableDefinition::new("entry_positions");
/// Persisted draft slots keyed by post id (`DraftSlot`, bincode-encoded).
pub const DRAFTS: TableDefinition<u64, &[u8]> = TableDefinition::new("drafts");
/// Monotonic id counters.
pub const SEQUENCES: TableDefinition<&str, u64> = TableDefinition::new("sequences");

pub(crate) const POST_SEQUENCE: &str = "post";
pub(crate) const ENTRY_SEQUENCE: &str = "entry";
