//! Database layer for Blotter, backed by a single redb file.

/// Trait implementations wiring [`Database`] into the ordering and draft layers.
mod content_store;
/// Persisted draft slots.
pub mod draft;
/// Entry rows and the position index.
pub mod entry;
mod helpers;
/// Post rows.
pub mod post;
/// redb table definitions.
pub mod tables;

use crate::error::AppError;
use std::path::Path;
use std::sync::Arc;

/// Database handle with access to the typed table accessors.
pub struct Database {
    pub db: Arc<redb::Database>,
    pub posts: post::PostDb,
    pub entries: entry::EntryDb,
    pub drafts: draft::DraftDb,
}

#[cfg(test)]
mod tests;

impl Database {
    /// Open (or create) the database under the directory `path`.
    ///
    /// # Returns
    /// A fully initialized [`Database`].
    ///
    /// # Errors
    /// Returns an error when the directory cannot be created, the file is
    /// held by another process, or table initialization fails.
    pub fn new(path: &str) -> Result<Self, AppError> {
        let dir = Path::new(path);
        std::fs::create_dir_all(dir)?;
        let file = dir.join(tables::REDB_FILE_NAME);

        let db = match redb::Database::create(&file) {
            Ok(db) => db,
            Err(redb::DatabaseError::DatabaseAlreadyOpen) => {
                return Err(AppError::StorageMessage(format!(
                    "Database at {} is already open in another process.\n\
                     Stop the other Blotter instance or set DB_PATH to a different location.",
                    file.display()
                )));
            }
            Err(err) => return Err(err.into()),
        };
        tracing::info!(path = %file.display(), "database opened");
        Self::from_shared(Arc::new(db))
    }

    /// Build a handle over an already-open redb database.
    ///
    /// # Errors
    /// Returns an error when table initialization fails.
    pub fn from_shared(db: Arc<redb::Database>) -> Result<Self, AppError> {
        Ok(Self {
            posts: post::PostDb::new(db.clone())?,
            entries: entry::EntryDb::new(db.clone())?,
            drafts: draft::DraftDb::new(db.clone())?,
            db,
        })
    }

    /// Another handle over the same underlying database.
    ///
    /// # Errors
    /// Returns an error when table initialization fails.
    pub fn share(&self) -> Result<Self, AppError> {
        Self::from_shared(self.db.clone())
    }

    /// redb commits are durable on return; kept for callers that flush on shutdown.
    pub fn flush(&self) -> Result<(), AppError> {
        Ok(())
    }
}
