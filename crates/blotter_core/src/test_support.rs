//! Shared fakes and fixtures for core unit tests.

use crate::db::Database;
use crate::error::AppError;
use crate::media::{Transcoder, TypeDetector};
use crate::models::draft::DraftSlot;
use crate::models::{EntryId, PostId};
use crate::store::{ContentStore, DraftPersistence};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use tempfile::TempDir;

pub(crate) fn setup_temp_db() -> (Database, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("db");
    let db = Database::new(db_path.to_str().unwrap()).unwrap();
    (db, temp_dir)
}

/// One call made against [`RecordingStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum StoreCall {
    CreateEntry { post_id: PostId, index: i64, markdown: String },
    UpdateEntry { entry_id: EntryId, markdown: String },
    DeleteEntry(EntryId),
    UpdateEntryIndex { entry_id: EntryId, index: i64 },
    AttachFiles { entry_id: EntryId, paths: Vec<String> },
    ListEntryIndices(PostId),
    EntryExists(EntryId),
    PostExists(PostId),
}

#[derive(Default)]
struct MemState {
    posts: BTreeSet<PostId>,
    // entry id -> (post id, index, markdown)
    entries: BTreeMap<EntryId, (PostId, i64, String)>,
    files: BTreeMap<EntryId, Vec<String>>,
    next_entry_id: EntryId,
}

impl MemState {
    fn index_taken(&self, post_id: PostId, index: i64, except: Option<EntryId>) -> bool {
        self.entries
            .iter()
            .any(|(id, (post, idx, _))| *post == post_id && *idx == index && Some(*id) != except)
    }
}

/// In-memory [`ContentStore`] that enforces unique indices and logs every call.
///
/// Uses the trait's default one-record-at-a-time `apply_index_moves`.
#[derive(Default)]
pub(crate) struct RecordingStore {
    state: Mutex<MemState>,
    calls: Mutex<Vec<StoreCall>>,
    injected_conflicts: AtomicUsize,
    fail_attach: AtomicBool,
}

impl RecordingStore {
    pub(crate) fn with_post(post_id: PostId) -> Self {
        let store = Self::default();
        store.add_post(post_id);
        store
    }

    pub(crate) fn add_post(&self, post_id: PostId) {
        self.state.lock().unwrap().posts.insert(post_id);
    }

    pub(crate) fn remove_post(&self, post_id: PostId) {
        let mut state = self.state.lock().unwrap();
        state.posts.remove(&post_id);
        state.entries.retain(|_, (post, _, _)| *post != post_id);
    }

    /// Insert entries at the given indices without recording calls.
    pub(crate) fn seed(&self, post_id: PostId, indices: &[i64]) -> Vec<EntryId> {
        let mut state = self.state.lock().unwrap();
        state.posts.insert(post_id);
        indices
            .iter()
            .map(|index| {
                state.next_entry_id += 1;
                let id = state.next_entry_id;
                state
                    .entries
                    .insert(id, (post_id, *index, format!("entry at {}", index)));
                id
            })
            .collect()
    }

    /// `(entry_id, index)` pairs of a post, ascending by index.
    pub(crate) fn indices(&self, post_id: PostId) -> Vec<(EntryId, i64)> {
        let state = self.state.lock().unwrap();
        let mut pairs: Vec<(EntryId, i64)> = state
            .entries
            .iter()
            .filter(|(_, (post, _, _))| *post == post_id)
            .map(|(id, (_, index, _))| (*id, *index))
            .collect();
        pairs.sort_by_key(|(_, index)| *index);
        pairs
    }

    pub(crate) fn index_of(&self, entry_id: EntryId) -> Option<i64> {
        let state = self.state.lock().unwrap();
        state.entries.get(&entry_id).map(|(_, index, _)| *index)
    }

    pub(crate) fn markdown_of(&self, entry_id: EntryId) -> Option<String> {
        let state = self.state.lock().unwrap();
        state.entries.get(&entry_id).map(|(_, _, md)| md.clone())
    }

    pub(crate) fn files_of(&self, entry_id: EntryId) -> Vec<String> {
        let state = self.state.lock().unwrap();
        state.files.get(&entry_id).cloned().unwrap_or_default()
    }

    /// Fail the next `attach_files` call with a storage error.
    pub(crate) fn fail_next_attach(&self) {
        self.fail_attach.store(true, Ordering::SeqCst);
    }

    pub(crate) fn calls(&self) -> Vec<StoreCall> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn take_calls(&self) -> Vec<StoreCall> {
        std::mem::take(&mut *self.calls.lock().unwrap())
    }

    /// Only the mutating calls, in order.
    pub(crate) fn writes(&self) -> Vec<StoreCall> {
        self.calls()
            .into_iter()
            .filter(|call| {
                matches!(
                    call,
                    StoreCall::CreateEntry { .. }
                        | StoreCall::UpdateEntry { .. }
                        | StoreCall::DeleteEntry(_)
                        | StoreCall::UpdateEntryIndex { .. }
                        | StoreCall::AttachFiles { .. }
                )
            })
            .collect()
    }

    /// Fail the next `count` create/index writes with `Conflict`.
    pub(crate) fn inject_conflicts(&self, count: usize) {
        self.injected_conflicts.store(count, Ordering::SeqCst);
    }

    fn record(&self, call: StoreCall) {
        self.calls.lock().unwrap().push(call);
    }

    fn take_injected_conflict(&self) -> bool {
        self.injected_conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl ContentStore for RecordingStore {
    fn create_entry(
        &self,
        post_id: PostId,
        index: i64,
        markdown: &str,
    ) -> Result<EntryId, AppError> {
        self.record(StoreCall::CreateEntry {
            post_id,
            index,
            markdown: markdown.to_string(),
        });
        if self.take_injected_conflict() {
            return Err(AppError::Conflict("injected".to_string()));
        }
        let mut state = self.state.lock().unwrap();
        if !state.posts.contains(&post_id) {
            return Err(AppError::NotFound(format!("post {}", post_id)));
        }
        if state.index_taken(post_id, index, None) {
            return Err(AppError::Conflict(format!("index {} taken", index)));
        }
        state.next_entry_id += 1;
        let id = state.next_entry_id;
        state
            .entries
            .insert(id, (post_id, index, markdown.to_string()));
        Ok(id)
    }

    fn update_entry(&self, entry_id: EntryId, markdown: &str) -> Result<(), AppError> {
        self.record(StoreCall::UpdateEntry {
            entry_id,
            markdown: markdown.to_string(),
        });
        let mut state = self.state.lock().unwrap();
        match state.entries.get_mut(&entry_id) {
            Some((_, _, md)) => {
                *md = markdown.to_string();
                Ok(())
            }
            None => Err(AppError::NotFound(format!("entry {}", entry_id))),
        }
    }

    fn delete_entry(&self, entry_id: EntryId) -> Result<(), AppError> {
        self.record(StoreCall::DeleteEntry(entry_id));
        let mut state = self.state.lock().unwrap();
        state.files.remove(&entry_id);
        match state.entries.remove(&entry_id) {
            Some(_) => Ok(()),
            None => Err(AppError::NotFound(format!("entry {}", entry_id))),
        }
    }

    fn update_entry_index(&self, entry_id: EntryId, index: i64) -> Result<(), AppError> {
        self.record(StoreCall::UpdateEntryIndex { entry_id, index });
        if self.take_injected_conflict() {
            return Err(AppError::Conflict("injected".to_string()));
        }
        let mut state = self.state.lock().unwrap();
        let Some(&(post_id, _, _)) = state.entries.get(&entry_id) else {
            return Err(AppError::NotFound(format!("entry {}", entry_id)));
        };
        if state.index_taken(post_id, index, Some(entry_id)) {
            return Err(AppError::Conflict(format!("index {} taken", index)));
        }
        if let Some(entry) = state.entries.get_mut(&entry_id) {
            entry.1 = index;
        }
        Ok(())
    }

    fn attach_files(
        &self,
        post_id: PostId,
        entry_id: EntryId,
        paths: &[String],
    ) -> Result<(), AppError> {
        self.record(StoreCall::AttachFiles {
            entry_id,
            paths: paths.to_vec(),
        });
        if self.fail_attach.swap(false, Ordering::SeqCst) {
            return Err(AppError::StorageMessage("injected attach failure".to_string()));
        }
        let mut state = self.state.lock().unwrap();
        match state.entries.get(&entry_id) {
            Some((owner, _, _)) if *owner == post_id => {}
            _ => return Err(AppError::NotFound(format!("entry {} in post {}", entry_id, post_id))),
        }
        let recorded = state.files.entry(entry_id).or_default();
        for path in paths {
            if !recorded.contains(path) {
                recorded.push(path.clone());
            }
        }
        Ok(())
    }

    fn list_entry_indices(&self, post_id: PostId) -> Result<Vec<(EntryId, i64)>, AppError> {
        self.record(StoreCall::ListEntryIndices(post_id));
        Ok(self.indices(post_id))
    }

    fn entry_exists(&self, entry_id: EntryId) -> Result<bool, AppError> {
        self.record(StoreCall::EntryExists(entry_id));
        Ok(self.state.lock().unwrap().entries.contains_key(&entry_id))
    }

    fn post_exists(&self, post_id: PostId) -> Result<bool, AppError> {
        self.record(StoreCall::PostExists(post_id));
        Ok(self.state.lock().unwrap().posts.contains(&post_id))
    }
}

/// In-memory [`DraftPersistence`] counting saves.
#[derive(Default)]
pub(crate) struct MemoryDrafts {
    slots: Mutex<HashMap<PostId, DraftSlot>>,
    saves: AtomicUsize,
}

impl MemoryDrafts {
    pub(crate) fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub(crate) fn stored(&self, post_id: PostId) -> Option<DraftSlot> {
        self.slots.lock().unwrap().get(&post_id).cloned()
    }
}

impl DraftPersistence for MemoryDrafts {
    fn load(&self, post_id: PostId) -> Result<Option<DraftSlot>, AppError> {
        Ok(self.stored(post_id))
    }

    fn save(&self, post_id: PostId, slot: &DraftSlot) -> Result<(), AppError> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        self.slots.lock().unwrap().insert(post_id, slot.clone());
        Ok(())
    }

    fn clear(&self, post_id: PostId) -> Result<(), AppError> {
        self.slots.lock().unwrap().remove(&post_id);
        Ok(())
    }
}

/// Detector that always reports the same MIME type.
pub(crate) struct FixedDetector(pub &'static str);

impl TypeDetector for FixedDetector {
    fn name(&self) -> &'static str {
        "fixed"
    }

    fn detect(&self, _bytes: &[u8]) -> Result<String, AppError> {
        Ok(self.0.to_string())
    }
}

/// Transcoder that fails every call and counts attempts.
#[derive(Default)]
pub(crate) struct FailingTranscoder {
    pub(crate) attempts: AtomicUsize,
}

impl Transcoder for FailingTranscoder {
    fn transcode(&self, source: &Path) -> Result<PathBuf, AppError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(AppError::Transcode(format!(
            "cannot transcode {}",
            source.display()
        )))
    }
}

/// Transcoder that writes a placeholder preview next to the source.
pub(crate) struct StubTranscoder;

impl Transcoder for StubTranscoder {
    fn transcode(&self, source: &Path) -> Result<PathBuf, AppError> {
        let target = source.with_extension("gif");
        std::fs::write(&target, b"GIF89a")?;
        Ok(target)
    }
}

pub(crate) fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let image = image::DynamicImage::ImageRgb8(image::RgbImage::new(width, height));
    let mut out = Cursor::new(Vec::new());
    image
        .write_to(&mut out, image::ImageOutputFormat::Png)
        .unwrap();
    out.into_inner()
}

pub(crate) fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    let image = image::DynamicImage::ImageRgb8(image::RgbImage::new(width, height));
    let mut out = Cursor::new(Vec::new());
    image
        .write_to(&mut out, image::ImageOutputFormat::Jpeg(80))
        .unwrap();
    out.into_inner()
}

/// A minimal ISO BMFF header with an `isom` major brand.
pub(crate) fn mp4_bytes() -> Vec<u8> {
    let mut bytes = vec![0x00, 0x00, 0x00, 0x18];
    bytes.extend_from_slice(b"ftypisom");
    bytes.extend_from_slice(&[0x00, 0x00, 0x02, 0x00]);
    bytes.extend_from_slice(b"isomiso2");
    bytes.extend_from_slice(&[0x00, 0x00, 0x00, 0x08]);
    bytes.extend_from_slice(b"free");
    bytes
}
