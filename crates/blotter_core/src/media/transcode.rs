//! Preview derivation for video assets.

use crate::error::AppError;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// Capability that derives a preview file from a stored asset.
pub trait Transcoder: Send + Sync {
    /// Derive a preview next to `source` and return its path.
    fn transcode(&self, source: &Path) -> Result<PathBuf, AppError>;

    /// `false` skips preview derivation without treating it as a failure.
    fn enabled(&self) -> bool {
        true
    }
}

/// Silent, looping GIF previews via ffmpeg.
#[derive(Debug, Clone)]
pub struct FfmpegTranscoder {
    ffmpeg_path: String,
}

impl FfmpegTranscoder {
    pub fn new(ffmpeg_path: impl Into<String>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
        }
    }
}

impl Transcoder for FfmpegTranscoder {
    fn transcode(&self, source: &Path) -> Result<PathBuf, AppError> {
        let target = source.with_extension("gif");
        let output = Command::new(&self.ffmpeg_path)
            .args([
                "-y",
                "-i",
                source.to_string_lossy().as_ref(),
                "-an",
                "-vf",
                "fps=12,scale=480:-1:flags=lanczos",
                "-loop",
                "0",
                target.to_string_lossy().as_ref(),
            ])
            .stdin(Stdio::null())
            .output()
            .map_err(|err| AppError::Transcode(format!("ffmpeg spawn error: {}", err)))?;
        if !output.status.success() {
            // Don't leave a truncated preview behind.
            let _ = std::fs::remove_file(&target);
            let stderr = String::from_utf8_lossy(&output.stderr);
            let tail = stderr.lines().last().unwrap_or_default();
            return Err(AppError::Transcode(format!(
                "ffmpeg exited with {}: {}",
                output.status, tail
            )));
        }
        Ok(target)
    }
}

/// Transcoder used when previews are disabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTranscoder;

impl Transcoder for NoopTranscoder {
    fn enabled(&self) -> bool {
        false
    }

    fn transcode(&self, _source: &Path) -> Result<PathBuf, AppError> {
        Err(AppError::Transcode("previews are disabled".to_string()))
    }
}
