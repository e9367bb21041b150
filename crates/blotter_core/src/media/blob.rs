//! Asset file storage.

use crate::error::AppError;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

/// File storage for media assets, addressed by relative paths.
pub trait BlobStore: Send + Sync {
    fn write_file(&self, path: &str, bytes: &[u8]) -> Result<(), AppError>;

    fn read_file(&self, path: &str) -> Result<Vec<u8>, AppError>;

    /// Move `from` to `to`, replacing nothing: `to` must not exist yet.
    fn rename_file(&self, from: &str, to: &str) -> Result<(), AppError>;

    /// Remove a file; removing a missing file succeeds.
    fn delete_file(&self, path: &str) -> Result<(), AppError>;

    /// Absolute location on disk, for tools that need a real file.
    fn local_path(&self, path: &str) -> Result<PathBuf, AppError>;
}

/// [`BlobStore`] on the local filesystem under a root directory.
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Join `path` onto the root, rejecting anything that could escape it.
    fn resolve(&self, path: &str) -> Result<PathBuf, AppError> {
        let relative = Path::new(path);
        let mut has_segment = false;
        for component in relative.components() {
            match component {
                Component::Normal(_) => has_segment = true,
                Component::CurDir => {}
                _ => {
                    return Err(AppError::BadRequest(format!(
                        "Invalid asset path: {}",
                        path
                    )))
                }
            }
        }
        if !has_segment {
            return Err(AppError::BadRequest("Asset path is empty".to_string()));
        }
        Ok(self.root.join(relative))
    }
}

fn ensure_parent(path: &Path) -> Result<(), AppError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

impl BlobStore for LocalBlobStore {
    fn write_file(&self, path: &str, bytes: &[u8]) -> Result<(), AppError> {
        let target = self.resolve(path)?;
        ensure_parent(&target)?;
        std::fs::write(&target, bytes)?;
        tracing::debug!(path, bytes = bytes.len(), "blob written");
        Ok(())
    }

    fn read_file(&self, path: &str) -> Result<Vec<u8>, AppError> {
        let source = self.resolve(path)?;
        match std::fs::read(&source) {
            Ok(bytes) => Ok(bytes),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                Err(AppError::NotFound(format!("asset {}", path)))
            }
            Err(err) => Err(err.into()),
        }
    }

    fn rename_file(&self, from: &str, to: &str) -> Result<(), AppError> {
        let source = self.resolve(from)?;
        let target = self.resolve(to)?;
        if target.exists() {
            return Err(AppError::Conflict(format!("asset {} already exists", to)));
        }
        ensure_parent(&target)?;
        std::fs::rename(&source, &target)?;
        Ok(())
    }

    fn delete_file(&self, path: &str) -> Result<(), AppError> {
        let target = self.resolve(path)?;
        match std::fs::remove_file(&target) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    fn local_path(&self, path: &str) -> Result<PathBuf, AppError> {
        self.resolve(path)
    }
}
