use super::*;
use crate::db::Database;
use crate::test_support::{setup_temp_db, RecordingStore, StoreCall};
use std::sync::Mutex;
use std::thread;

const POST: PostId = 7;

fn engine(store: Arc<RecordingStore>) -> OrderingEngine<RecordingStore> {
    OrderingEngine::new(store, Arc::new(PostLockManager::default()))
}

fn index_values(store: &RecordingStore) -> Vec<i64> {
    store.indices(POST).into_iter().map(|(_, index)| index).collect()
}

#[test]
fn insert_into_middle_shifts_following_entries() {
    let store = Arc::new(RecordingStore::default());
    let ids = store.seed(POST, &[1, 2, 3]);
    let engine = engine(store.clone());

    let placement = engine.insert(POST, Some(2), "new").expect("insert");

    assert_eq!(placement.index, 2);
    assert_eq!(store.index_of(ids[0]), Some(1));
    assert_eq!(store.index_of(ids[1]), Some(3));
    assert_eq!(store.index_of(ids[2]), Some(4));
    assert_eq!(store.index_of(placement.entry_id), Some(2));
    assert_eq!(store.markdown_of(placement.entry_id).as_deref(), Some("new"));
}

#[test]
fn shift_writes_run_highest_index_first() {
    let store = Arc::new(RecordingStore::default());
    let ids = store.seed(POST, &[1, 2, 3]);
    let engine = engine(store.clone());

    engine.insert(POST, Some(2), "").expect("insert");

    let writes = store.writes();
    assert_eq!(
        writes[..2],
        [
            StoreCall::UpdateEntryIndex { entry_id: ids[2], index: 4 },
            StoreCall::UpdateEntryIndex { entry_id: ids[1], index: 3 },
        ]
    );
    assert!(matches!(writes[2], StoreCall::CreateEntry { index: 2, .. }));
}

#[test]
fn first_entry_gets_index_one_regardless_of_position() {
    for desired in [None, Some(1), Some(5), Some(-3)] {
        let store = Arc::new(RecordingStore::with_post(POST));
        let placement = engine(store.clone())
            .insert(POST, desired, "")
            .expect("insert");
        assert_eq!(placement.index, 1, "desired {:?}", desired);
    }
}

#[test]
fn append_uses_max_plus_one_without_shifting() {
    let store = Arc::new(RecordingStore::default());
    store.seed(POST, &[1, 4, 9]);
    let engine = engine(store.clone());
    store.take_calls();

    let placement = engine.insert(POST, None, "tail").expect("insert");

    assert_eq!(placement.index, 10);
    let writes = store.writes();
    assert_eq!(writes.len(), 1);
    assert!(matches!(writes[0], StoreCall::CreateEntry { index: 10, .. }));
}

#[test]
fn insert_at_max_plus_one_needs_no_shift() {
    let store = Arc::new(RecordingStore::default());
    store.seed(POST, &[1, 2, 3]);
    let engine = engine(store.clone());
    store.take_calls();

    engine.insert(POST, Some(4), "").expect("insert");

    assert_eq!(store.writes().len(), 1);
    assert_eq!(index_values(&store), vec![1, 2, 3, 4]);
}

#[test]
fn insert_far_beyond_end_leaves_gap() {
    let store = Arc::new(RecordingStore::default());
    store.seed(POST, &[1, 2]);
    let placement = engine(store.clone())
        .insert(POST, Some(50), "")
        .expect("insert");
    assert_eq!(placement.index, 50);
    assert_eq!(index_values(&store), vec![1, 2, 50]);
}

#[test]
fn insert_into_missing_post_is_not_found() {
    let store = Arc::new(RecordingStore::default());
    let err = engine(store.clone()).insert(POST, None, "").unwrap_err();
    assert!(err.is_not_found());
    assert!(store.writes().is_empty());
}

#[test]
fn indices_stay_unique_and_ordered_across_insert_sequences() {
    // (seed indices, sequence of desired positions)
    let cases: &[(&[i64], &[Option<i64>])] = &[
        (&[1, 2, 3], &[Some(1), Some(1), Some(1)]),
        (&[1, 2, 3], &[Some(2), None, Some(3), Some(5)]),
        (&[1, 3, 5, 7], &[Some(3), Some(4), Some(2)]),
        (&[], &[Some(4), Some(1), None, Some(2)]),
        (&[-2, 0, 2], &[Some(0), Some(-1), Some(3)]),
    ];

    for (seed, positions) in cases {
        let store = Arc::new(RecordingStore::with_post(POST));
        let seeded = store.seed(POST, seed);
        let engine = engine(store.clone());

        for desired in *positions {
            engine.insert(POST, *desired, "").expect("insert");

            let indices = index_values(&store);
            let mut deduped = indices.clone();
            deduped.dedup();
            assert_eq!(indices, deduped, "duplicate index after {:?} on {:?}", desired, seed);

            // Seeded entries keep their relative order.
            let seeded_order: Vec<i64> = seeded
                .iter()
                .map(|id| store.index_of(*id).expect("seeded entry"))
                .collect();
            assert!(
                seeded_order.windows(2).all(|pair| pair[0] < pair[1]),
                "order broken after {:?} on {:?}: {:?}",
                desired,
                seed,
                seeded_order
            );
        }
    }
}

#[test]
fn reindex_to_current_index_is_a_no_op() {
    let store = Arc::new(RecordingStore::default());
    let ids = store.seed(POST, &[1, 2, 3]);
    let engine = engine(store.clone());
    let before = store.indices(POST);

    for _ in 0..3 {
        let placement = engine.reindex_for(POST, ids[1], 2).expect("reindex");
        assert_eq!(placement.index, 2);
    }

    assert_eq!(store.indices(POST), before);
    assert!(store.writes().is_empty());
}

#[test]
fn reindex_moves_entry_up_front() {
    let store = Arc::new(RecordingStore::default());
    let ids = store.seed(POST, &[1, 2, 3]);
    let engine = engine(store.clone());

    engine.reindex_for(POST, ids[2], 1).expect("reindex");

    assert_eq!(store.index_of(ids[2]), Some(1));
    assert_eq!(store.index_of(ids[0]), Some(2));
    assert_eq!(store.index_of(ids[1]), Some(3));
}

#[test]
fn reindex_moves_entry_toward_end() {
    let store = Arc::new(RecordingStore::default());
    let ids = store.seed(POST, &[1, 2, 3]);
    let engine = engine(store.clone());

    engine.reindex_for(POST, ids[0], 3).expect("reindex");

    assert_eq!(store.index_of(ids[1]), Some(2));
    assert_eq!(store.index_of(ids[0]), Some(3));
    assert_eq!(store.index_of(ids[2]), Some(4));
}

#[test]
fn reindex_sequences_keep_indices_unique() {
    let moves: &[(usize, i64)] = &[(0, 3), (3, 1), (2, 2), (1, 10), (0, 1), (3, 4)];
    let store = Arc::new(RecordingStore::default());
    let ids = store.seed(POST, &[1, 2, 3, 4]);
    let engine = engine(store.clone());

    for &(which, target) in moves {
        engine.reindex_for(POST, ids[which], target).expect("reindex");
        assert_eq!(store.index_of(ids[which]), Some(target));
        let indices = index_values(&store);
        let mut deduped = indices.clone();
        deduped.dedup();
        assert_eq!(indices, deduped);
        assert_eq!(indices.len(), ids.len());
    }
}

#[test]
fn reindex_unknown_entry_or_post_is_not_found() {
    let store = Arc::new(RecordingStore::default());
    store.seed(POST, &[1]);
    store.seed(POST + 1, &[1]);
    let engine = engine(store.clone());

    assert!(engine.reindex_for(POST, 999, 1).unwrap_err().is_not_found());
    assert!(engine.reindex_for(POST + 2, 1, 1).unwrap_err().is_not_found());
    // Entry 2 belongs to the other post.
    assert!(engine.reindex_for(POST, 2, 1).unwrap_err().is_not_found());
}

#[test]
fn conflict_rolls_back_and_retries_whole_sequence() {
    let store = Arc::new(RecordingStore::default());
    let ids = store.seed(POST, &[1, 2, 3]);
    let engine = engine(store.clone());
    store.inject_conflicts(2);

    // First attempt: the first shift write conflicts. Second attempt: both
    // shifts land, creation conflicts and the shifts are undone. Third succeeds.
    let placement = engine.insert(POST, Some(2), "x").expect("insert");

    assert_eq!(placement.index, 2);
    assert_eq!(store.index_of(ids[0]), Some(1));
    assert_eq!(store.index_of(ids[1]), Some(3));
    assert_eq!(store.index_of(ids[2]), Some(4));
    let reads = store
        .calls()
        .iter()
        .filter(|call| matches!(call, StoreCall::ListEntryIndices(_)))
        .count();
    assert_eq!(reads, 3);
}

#[test]
fn conflict_after_max_attempts_surfaces_and_leaves_indices_intact() {
    let store = Arc::new(RecordingStore::default());
    store.seed(POST, &[1, 2, 3]);
    let engine = engine(store.clone());
    let before = store.indices(POST);
    store.inject_conflicts(usize::MAX);

    let err = engine.insert(POST, Some(1), "x").unwrap_err();

    assert!(err.is_conflict());
    store.inject_conflicts(0);
    assert_eq!(store.indices(POST), before);
}

#[test]
fn shift_plan_orders_moves_highest_first() {
    let plan = shift_plan(&[(10, 1), (11, 2), (12, 5)], 2).expect("plan");
    assert_eq!(
        plan,
        vec![
            IndexMove { entry_id: 12, from: 5, to: 6 },
            IndexMove { entry_id: 11, from: 2, to: 3 },
        ]
    );
    assert!(shift_plan(&[(10, 1)], 2).expect("plan").is_empty());
    assert!(shift_plan(&[(10, i64::MAX)], 1).is_err());
}

#[test]
fn concurrent_inserts_on_one_post_keep_indices_unique() {
    let (db, _temp) = setup_temp_db();
    let post_id = db.posts.create(None).expect("post").id;
    let db = Arc::new(db);
    let engine = OrderingEngine::new(db.clone(), Arc::new(PostLockManager::default()));

    let handles: Vec<_> = (0..4)
        .map(|worker| {
            let engine = engine.clone();
            thread::spawn(move || {
                for round in 0..5 {
                    let desired = if (worker + round) % 2 == 0 { Some(1) } else { None };
                    engine
                        .insert(post_id, desired, &format!("w{}r{}", worker, round))
                        .expect("insert");
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("worker");
    }

    let indices: Vec<i64> = db
        .entries
        .indices(post_id)
        .expect("indices")
        .into_iter()
        .map(|(_, index)| index)
        .collect();
    assert_eq!(indices.len(), 20);
    let mut deduped = indices.clone();
    deduped.dedup();
    assert_eq!(indices, deduped);
}

#[test]
fn redb_store_applies_scenario_in_one_batch() {
    let (db, _temp) = setup_temp_db();
    let post = db.posts.create(None).expect("post");
    let db = Arc::new(db);
    let engine = OrderingEngine::new(db.clone(), Arc::new(PostLockManager::default()));
    let a = engine.insert(post.id, None, "a").expect("a");
    let b = engine.insert(post.id, None, "b").expect("b");
    let c = engine.insert(post.id, None, "c").expect("c");

    let new = engine.insert(post.id, Some(2), "new").expect("insert");

    assert_eq!(
        db.entries.indices(post.id).expect("indices"),
        vec![(a.entry_id, 1), (new.entry_id, 2), (b.entry_id, 3), (c.entry_id, 4)]
    );
}

/// redb store whose next index read is followed by one entry deletion, as
/// if a writer slipped in between the read and the shift.
struct VanishingEntryStore {
    db: Arc<Database>,
    doomed: Mutex<Option<EntryId>>,
}

impl ContentStore for VanishingEntryStore {
    fn create_entry(&self, post_id: PostId, index: i64, markdown: &str) -> Result<EntryId, AppError> {
        self.db.create_entry(post_id, index, markdown)
    }

    fn update_entry(&self, entry_id: EntryId, markdown: &str) -> Result<(), AppError> {
        self.db.update_entry(entry_id, markdown)
    }

    fn delete_entry(&self, entry_id: EntryId) -> Result<(), AppError> {
        self.db.delete_entry(entry_id)
    }

    fn update_entry_index(&self, entry_id: EntryId, index: i64) -> Result<(), AppError> {
        self.db.update_entry_index(entry_id, index)
    }

    fn attach_files(&self, post_id: PostId, entry_id: EntryId, paths: &[String]) -> Result<(), AppError> {
        self.db.attach_files(post_id, entry_id, paths)
    }

    fn list_entry_indices(&self, post_id: PostId) -> Result<Vec<(EntryId, i64)>, AppError> {
        let current = self.db.list_entry_indices(post_id)?;
        if let Some(entry_id) = self.doomed.lock().unwrap().take() {
            self.db.delete_entry(entry_id)?;
        }
        Ok(current)
    }

    fn entry_exists(&self, entry_id: EntryId) -> Result<bool, AppError> {
        self.db.entry_exists(entry_id)
    }

    fn post_exists(&self, post_id: PostId) -> Result<bool, AppError> {
        self.db.post_exists(post_id)
    }

    fn apply_index_moves(&self, moves: &[IndexMove]) -> Result<(), AppError> {
        self.db.apply_index_moves(moves)
    }
}

#[test]
fn entry_deleted_mid_plan_triggers_retry_instead_of_not_found() {
    let (db, _temp) = setup_temp_db();
    let post = db.posts.create(None).expect("post");
    let first = db.entries.create(post.id, 1, "first").expect("first");
    let second = db.entries.create(post.id, 2, "second").expect("second");
    let store = Arc::new(VanishingEntryStore {
        db: Arc::new(db),
        doomed: Mutex::new(Some(first.id)),
    });
    let engine = OrderingEngine::new(store.clone(), Arc::new(PostLockManager::default()));

    let placement = engine.insert(post.id, Some(1), "new").expect("insert after retry");

    assert_eq!(placement.index, 1);
    assert_eq!(
        store.db.entries.indices(post.id).expect("indices"),
        vec![(placement.entry_id, 1), (second.id, 3)]
    );
}

#[test]
fn sequential_default_moves_report_vanished_entry_as_conflict() {
    let store = RecordingStore::default();
    let ids = store.seed(POST, &[1, 2]);
    store.delete_entry(ids[0]).expect("delete");

    let err = store
        .apply_index_moves(&[
            IndexMove { entry_id: ids[1], from: 2, to: 3 },
            IndexMove { entry_id: ids[0], from: 1, to: 2 },
        ])
        .unwrap_err();

    assert!(err.is_conflict());
    assert_eq!(store.indices(POST), vec![(ids[1], 2)]);
}
