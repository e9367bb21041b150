//! Database integration tests.

use super::*;
use crate::error::AppError;
use crate::models::draft::DraftSlot;
use crate::store::IndexMove;
use tempfile::TempDir;


fn setup_test_db() -> (Database, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("db");
    let db = Database::new(db_path.to_str().unwrap()).unwrap();
    (db, temp_dir)
}

fn index_map(db: &Database, post_id: u64) -> Vec<(u64, i64)> {
    db.entries.indices(post_id).expect("indices")
}
