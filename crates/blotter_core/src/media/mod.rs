//! Pasted media ingestion.
//!
//! A payload is decoded, written under a temporary name, typed by its bytes,
//! and renamed to carry the extension of its verified kind. Videos also get a
//! preview; a failed preview never fails the ingest.

pub mod blob;
pub mod detection;
#[cfg(feature = "magika")]
pub mod magika;
pub mod payload;
pub mod transcode;


pub use blob::{BlobStore, LocalBlobStore};
pub use detection::{build_detector, FileCommandDetector, SignatureDetector, TypeDetector};
pub use payload::{decode_payload, DecodedPayload};
pub use transcode::{FfmpegTranscoder, NoopTranscoder, Transcoder};

use crate::config::Config;
use crate::constants::CAPTURE_ROUTE_PREFIX;
use crate::error::AppError;
use crate::models::PostId;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use std::sync::Arc;
use uuid::Uuid;

/// Media kinds accepted into posts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Png,
    Jpeg,
    Mp4,
}

impl MediaKind {
    /// Map a detected MIME type to a supported kind.
    ///
    /// # Errors
    /// [`AppError::UnsupportedMedia`] for anything else.
    pub fn from_mime(mime: &str) -> Result<Self, AppError> {
        let essence = mime.split(';').next().unwrap_or_default().trim();
        match essence.to_ascii_lowercase().as_str() {
            "image/png" => Ok(Self::Png),
            "image/jpeg" => Ok(Self::Jpeg),
            "video/mp4" => Ok(Self::Mp4),
            _ => Err(AppError::UnsupportedMedia(essence.to_string())),
        }
    }

    pub fn mime(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::Mp4 => "video/mp4",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::Mp4 => "mp4",
        }
    }

    pub fn is_video(self) -> bool {
        matches!(self, Self::Mp4)
    }

    fn image_format(self) -> Option<image::ImageFormat> {
        match self {
            Self::Png => Some(image::ImageFormat::Png),
            Self::Jpeg => Some(image::ImageFormat::Jpeg),
            Self::Mp4 => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// A stored, type-verified asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaAsset {
    /// Path relative to the asset directory, e.g. `3/20240501-101500-042-1a2b3c4d.png`.
    pub path: String,
    pub kind: MediaKind,
    /// MIME type reported by the detector.
    pub mime: String,
    pub size_bytes: u64,
    pub dimensions: Option<Dimensions>,
    /// Derived preview for videos, relative like `path`.
    pub preview_path: Option<String>,
}

impl MediaAsset {
    /// Markdown that embeds this asset.
    pub fn markdown_snippet(&self, base_url: &str) -> String {
        if self.kind.is_video() {
            format!(
                "::video{{filename=\"{}/{}\"}}",
                CAPTURE_ROUTE_PREFIX, self.path
            )
        } else {
            format!(
                "![]({}/{}/{})",
                base_url.trim_end_matches('/'),
                CAPTURE_ROUTE_PREFIX,
                self.path
            )
        }
    }
}

fn read_dimensions(bytes: &[u8], format: image::ImageFormat) -> Result<Dimensions, AppError> {
    let (width, height) = image::io::Reader::with_format(Cursor::new(bytes), format)
        .into_dimensions()
        .map_err(|err| {
            AppError::UnsupportedMedia(format!("unreadable {:?} image: {}", format, err))
        })?;
    Ok(Dimensions { width, height })
}

fn final_asset_path(post_id: PostId, kind: MediaKind) -> String {
    let stamp = Utc::now().format("%Y%m%d-%H%M%S-%3f");
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{}/{}-{}.{}", post_id, stamp, &suffix[..8], kind.extension())
}

/// Turns pasted payloads into stored assets.
pub struct MediaPipeline {
    blobs: Arc<dyn BlobStore>,
    detector: Arc<dyn TypeDetector>,
    transcoder: Arc<dyn Transcoder>,
    max_payload_size: usize,
}

impl MediaPipeline {
    pub fn new(
        blobs: Arc<dyn BlobStore>,
        detector: Arc<dyn TypeDetector>,
        transcoder: Arc<dyn Transcoder>,
        max_payload_size: usize,
    ) -> Self {
        Self {
            blobs,
            detector,
            transcoder,
            max_payload_size,
        }
    }

    /// Pipeline over the local asset directory with the configured detector.
    pub fn from_config(config: &Config) -> Self {
        let transcoder: Arc<dyn Transcoder> = if config.transcode_previews {
            Arc::new(FfmpegTranscoder::new(config.ffmpeg_path.clone()))
        } else {
            Arc::new(NoopTranscoder)
        };
        Self::new(
            Arc::new(LocalBlobStore::new(&config.asset_dir)),
            build_detector(config),
            transcoder,
            config.max_payload_size,
        )
    }

    pub fn blobs(&self) -> &Arc<dyn BlobStore> {
        &self.blobs
    }

    /// Store a pasted payload as an asset of `post_id`.
    ///
    /// The caller-supplied type is ignored; the stored extension follows the
    /// detected type. This blocks on file IO and external tools, so async
    /// callers should run it on a blocking pool.
    ///
    /// # Errors
    /// [`AppError::BadRequest`] / [`AppError::PayloadTooLarge`] for bad
    /// payloads, [`AppError::UnsupportedMedia`] for unsupported or unreadable
    /// content, storage errors otherwise. No temporary file survives an error.
    pub fn ingest(&self, post_id: PostId, raw: &str) -> Result<MediaAsset, AppError> {
        let payload = decode_payload(raw, self.max_payload_size)?;
        if let Some(claimed) = payload.claimed_type.as_deref() {
            tracing::debug!(post_id, claimed, "ignoring caller-supplied media type");
        }

        let temp_path = format!("{}/{}", post_id, Uuid::new_v4());
        self.blobs.write_file(&temp_path, &payload.bytes)?;

        let mut asset = match self.store_verified(post_id, &temp_path) {
            Ok(asset) => asset,
            Err(err) => {
                if let Err(cleanup_err) = self.blobs.delete_file(&temp_path) {
                    tracing::warn!(
                        "Failed to remove temporary asset {}: {}",
                        temp_path,
                        cleanup_err
                    );
                }
                return Err(err);
            }
        };

        if asset.kind.is_video() {
            asset.preview_path = self.derive_preview(post_id, &asset.path);
        }

        tracing::info!(
            post_id,
            path = %asset.path,
            mime = %asset.mime,
            size_bytes = asset.size_bytes,
            detector = self.detector.name(),
            "media ingested"
        );
        Ok(asset)
    }

    fn store_verified(&self, post_id: PostId, temp_path: &str) -> Result<MediaAsset, AppError> {
        let bytes = self.blobs.read_file(temp_path)?;
        let mime = self.detector.detect(&bytes)?;
        let kind = MediaKind::from_mime(&mime)?;
        let dimensions = match kind.image_format() {
            Some(format) => Some(read_dimensions(&bytes, format)?),
            None => None,
        };

        let path = final_asset_path(post_id, kind);
        self.blobs.rename_file(temp_path, &path)?;
        Ok(MediaAsset {
            path,
            kind,
            mime,
            size_bytes: bytes.len() as u64,
            dimensions,
            preview_path: None,
        })
    }

    fn derive_preview(&self, post_id: PostId, path: &str) -> Option<String> {
        if !self.transcoder.enabled() {
            tracing::debug!(path, "preview derivation disabled");
            return None;
        }
        let derived = self
            .blobs
            .local_path(path)
            .and_then(|source| self.transcoder.transcode(&source));
        match derived {
            Ok(preview) => {
                let name = preview.file_name()?.to_string_lossy().into_owned();
                Some(format!("{}/{}", post_id, name))
            }
            Err(err) => {
                tracing::warn!(post_id, path, "Preview derivation skipped: {}", err);
                None
            }
        }
    }
}
