//! Core domain library for Blotter (ordering, drafts, media capture, storage).

/// Configuration loading and defaults.
pub mod config;
/// Shared constants.
pub mod constants;
/// Database access layer backed by redb.
pub mod db;
/// Single-slot draft lifecycle and commit decisions.
pub mod draft;
/// Process-global environment mutation helpers.
pub mod env;
/// Application error types (storage/domain).
pub mod error;
/// Pasted media ingestion pipeline.
pub mod media;
/// Data models for persistence and API payloads.
pub mod models;
/// Entry index assignment and reindexing.
pub mod ordering;
/// Per-post critical sections for index mutations.
pub mod post_locks;
/// Storage contracts consumed by the ordering engine and draft machine.
pub mod store;
/// Bulk file upload into a new entry.
pub mod upload;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::Config;
pub use constants::*;
pub use db::Database;
pub use draft::{CommitAction, CommitOutcome, DraftMachine};
pub use error::AppError;
pub use media::{MediaAsset, MediaKind, MediaPipeline};
pub use ordering::OrderingEngine;
pub use post_locks::{PostLockManager, PostTxnGuard};
pub use store::{ContentStore, DraftPersistence, IndexMove};
pub use upload::{BulkUploader, UploadOutcome, UploadedFile};
