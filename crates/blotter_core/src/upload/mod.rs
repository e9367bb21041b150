//! Bulk file upload into a new entry.
//!
//! Files keep their (sanitized) names under `<post>/uploads/`, are listed in
//! the markdown of one appended entry, and are recorded on that entry's
//! `files`. Nothing is sniffed: uploads are attachments, not embedded media.

use crate::constants::CAPTURE_ROUTE_PREFIX;
use crate::error::AppError;
use crate::media::BlobStore;
use crate::models::entry::EntryPlacement;
use crate::models::{EntryId, PostId};
use crate::ordering::OrderingEngine;
use crate::store::ContentStore;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;


/// One file handed to [`BulkUploader::upload`].
#[derive(Debug, Clone)]
pub struct UploadedFile {
    /// Name as sent by the client; only its last path component is kept.
    pub name: String,
    pub bytes: Vec<u8>,
}

/// The entry an upload produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadOutcome {
    pub entry_id: EntryId,
    pub index: i64,
    pub files: Vec<String>,
}

/// Last path component of a client file name.
///
/// # Errors
/// [`AppError::BadRequest`] when nothing usable is left.
pub fn sanitize_upload_name(name: &str) -> Result<String, AppError> {
    let leaf = name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();
    if leaf.is_empty() || leaf == "." || leaf == ".." || leaf.contains('\0') {
        return Err(AppError::BadRequest(format!("Unusable file name {:?}", name)));
    }
    Ok(leaf.to_string())
}

/// Markdown listing uploaded files as links under the capture route.
pub fn upload_markdown(paths: &[String]) -> String {
    let mut markdown = String::from("Uploaded files:\n");
    for path in paths {
        let name = path.rsplit('/').next().unwrap_or(path);
        markdown.push_str(&format!("\n- [{}]({}/{})", name, CAPTURE_ROUTE_PREFIX, path));
    }
    markdown
}

/// Stores a batch of files and appends one entry that references them.
pub struct BulkUploader<S: ContentStore + ?Sized> {
    ordering: OrderingEngine<S>,
    blobs: Arc<dyn BlobStore>,
    max_file_size: usize,
}

impl<S: ContentStore + ?Sized> BulkUploader<S> {
    pub fn new(ordering: OrderingEngine<S>, blobs: Arc<dyn BlobStore>, max_file_size: usize) -> Self {
        Self {
            ordering,
            blobs,
            max_file_size,
        }
    }

    /// Store `files` for `post_id` and append an entry listing them.
    ///
    /// Either every file is stored and recorded on the new entry, or nothing
    /// stays behind.
    ///
    /// # Errors
    /// [`AppError::BadRequest`] for an empty batch, unusable or repeated
    /// names; [`AppError::PayloadTooLarge`] for an oversized file;
    /// [`AppError::NotFound`] for a missing post; [`AppError::Conflict`] when
    /// an upload of the same name already exists; storage errors otherwise.
    pub fn upload(&self, post_id: PostId, files: &[UploadedFile]) -> Result<UploadOutcome, AppError> {
        if files.is_empty() {
            return Err(AppError::BadRequest("No files to upload".to_string()));
        }
        let mut names = Vec::with_capacity(files.len());
        let mut seen = HashSet::new();
        for file in files {
            let name = sanitize_upload_name(&file.name)?;
            if !seen.insert(name.clone()) {
                return Err(AppError::BadRequest(format!("File {} listed twice", name)));
            }
            if file.bytes.len() > self.max_file_size {
                return Err(AppError::PayloadTooLarge(self.max_file_size));
            }
            names.push(name);
        }
        if !self.ordering.store().post_exists(post_id)? {
            return Err(AppError::NotFound(format!("post {}", post_id)));
        }

        let mut stored: Vec<String> = Vec::with_capacity(files.len());
        for (file, name) in files.iter().zip(&names) {
            match self.store_file(post_id, name, &file.bytes) {
                Ok(path) => stored.push(path),
                Err(err) => {
                    self.remove_blobs(&stored);
                    return Err(err);
                }
            }
        }

        let placement = match self.record_entry(post_id, &stored) {
            Ok(placement) => placement,
            Err(err) => {
                self.remove_blobs(&stored);
                return Err(err);
            }
        };
        tracing::info!(
            post_id,
            entry_id = placement.entry_id,
            files = stored.len(),
            "files uploaded"
        );
        Ok(UploadOutcome {
            entry_id: placement.entry_id,
            index: placement.index,
            files: stored,
        })
    }

    fn store_file(&self, post_id: PostId, name: &str, bytes: &[u8]) -> Result<String, AppError> {
        let temp_path = format!("{}/{}", post_id, Uuid::new_v4());
        let path = format!("{}/uploads/{}", post_id, name);
        self.blobs.write_file(&temp_path, bytes)?;
        if let Err(err) = self.blobs.rename_file(&temp_path, &path) {
            self.remove_blobs(std::slice::from_ref(&temp_path));
            return Err(err);
        }
        Ok(path)
    }

    fn record_entry(&self, post_id: PostId, paths: &[String]) -> Result<EntryPlacement, AppError> {
        let placement = self
            .ordering
            .insert(post_id, None, &upload_markdown(paths))?;
        let store = self.ordering.store();
        if let Err(err) = store.attach_files(post_id, placement.entry_id, paths) {
            let _guard = self.ordering.locks().lock(post_id)?;
            if let Err(delete_err) = store.delete_entry(placement.entry_id) {
                tracing::error!(
                    entry_id = placement.entry_id,
                    "Failed to remove entry of failed upload: {}",
                    delete_err
                );
            }
            return Err(err);
        }
        Ok(placement)
    }

    fn remove_blobs(&self, paths: &[String]) {
        for path in paths {
            if let Err(err) = self.blobs.delete_file(path) {
                tracing::warn!("Failed to remove uploaded file {}: {}", path, err);
            }
        }
    }
}
