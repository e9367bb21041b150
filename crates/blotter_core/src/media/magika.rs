//! Magika-powered content-type detection.

use super::detection::{TypeDetector, UNKNOWN_MIME};
use crate::error::AppError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, OnceLock};

static MAGIKA_SESSION: OnceLock<Result<Mutex<magika::Session>, String>> = OnceLock::new();
static MAGIKA_POISON_WARNED: AtomicBool = AtomicBool::new(false);

fn session() -> Result<&'static Mutex<magika::Session>, AppError> {
    MAGIKA_SESSION
        .get_or_init(|| {
            magika::Session::new().map(Mutex::new).map_err(|err| {
                tracing::warn!("magika session init failed: {}", err);
                err.to_string()
            })
        })
        .as_ref()
        .map_err(|err| AppError::UnsupportedMedia(format!("magika unavailable: {}", err)))
}

/// Detector backed by the magika model.
#[derive(Debug, Default, Clone, Copy)]
pub struct MagikaDetector;

impl MagikaDetector {
    /// Load the model ahead of the first paste.
    pub fn prewarm(&self) {
        let _ = session();
    }
}

impl TypeDetector for MagikaDetector {
    fn name(&self) -> &'static str {
        "magika"
    }

    fn detect(&self, bytes: &[u8]) -> Result<String, AppError> {
        let session = session()?;
        let mut guard = match session.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                if !MAGIKA_POISON_WARNED.swap(true, Ordering::Relaxed) {
                    tracing::warn!("magika session mutex was poisoned; recovering");
                }
                poisoned.into_inner()
            }
        };
        let result = guard
            .identify_content_sync(bytes)
            .map_err(|err| AppError::UnsupportedMedia(format!("magika inference failed: {}", err)))?;
        let mime = result.info().mime_type;
        if mime.is_empty() {
            return Ok(UNKNOWN_MIME.to_string());
        }
        Ok(mime.to_string())
    }
}
