//! Content-type detection from file bytes.
//!
//! Detectors look at what the bytes are, never at what the caller said they
//! are. Which detector runs is chosen by [`crate::config::DetectorKind`].

use crate::config::{Config, DetectorKind};
use crate::error::AppError;
use std::io::{ErrorKind, Write};
use std::process::{Command, Stdio};
use std::sync::Arc;

/// MIME type reported when no signature matches.
pub const UNKNOWN_MIME: &str = "application/octet-stream";

/// Capability that names the real type of a byte buffer.
pub trait TypeDetector: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Detected MIME type of `bytes`.
    fn detect(&self, bytes: &[u8]) -> Result<String, AppError>;
}

/// Built-in magic-byte matcher.
#[derive(Debug, Default, Clone, Copy)]
pub struct SignatureDetector;

const PNG_SIGNATURE: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
const JPEG_SIGNATURE: &[u8] = &[0xFF, 0xD8, 0xFF];

fn iso_bmff_mime(bytes: &[u8]) -> Option<&'static str> {
    if bytes.len() < 12 || &bytes[4..8] != b"ftyp" {
        return None;
    }
    let brand = &bytes[8..12];
    let mime = match brand {
        b"isom" | b"iso2" | b"iso3" | b"iso4" | b"iso5" | b"iso6" | b"mp41" | b"mp42"
        | b"avc1" | b"dash" | b"M4V " | b"mmp4" => "video/mp4",
        b"qt  " => "video/quicktime",
        b"M4A " | b"M4B " => "audio/mp4",
        b"heic" | b"heix" | b"mif1" | b"msf1" => "image/heic",
        b"avif" => "image/avif",
        _ if brand.starts_with(b"3gp") => "video/3gpp",
        _ if brand.starts_with(b"3g2") => "video/3gpp2",
        _ => UNKNOWN_MIME,
    };
    Some(mime)
}

impl TypeDetector for SignatureDetector {
    fn name(&self) -> &'static str {
        "signature"
    }

    fn detect(&self, bytes: &[u8]) -> Result<String, AppError> {
        let mime = if bytes.starts_with(PNG_SIGNATURE) {
            "image/png"
        } else if bytes.starts_with(JPEG_SIGNATURE) {
            "image/jpeg"
        } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
            "image/gif"
        } else if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
            "image/webp"
        } else if bytes.starts_with(b"%PDF-") {
            "application/pdf"
        } else if let Some(mime) = iso_bmff_mime(bytes) {
            mime
        } else {
            UNKNOWN_MIME
        };
        Ok(mime.to_string())
    }
}

/// Detector backed by the `file` utility (`file --brief --mime-type -`).
#[derive(Debug, Clone)]
pub struct FileCommandDetector {
    program: String,
}

impl Default for FileCommandDetector {
    fn default() -> Self {
        Self::new("file")
    }
}

impl FileCommandDetector {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl TypeDetector for FileCommandDetector {
    fn name(&self) -> &'static str {
        "file"
    }

    fn detect(&self, bytes: &[u8]) -> Result<String, AppError> {
        let mut child = Command::new(&self.program)
            .args(["--brief", "--mime-type", "-"])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| {
                AppError::UnsupportedMedia(format!("failed to run {}: {}", self.program, err))
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            // `file` stops reading once it has seen enough.
            if let Err(err) = stdin.write_all(bytes) {
                if err.kind() != ErrorKind::BrokenPipe {
                    return Err(err.into());
                }
            }
        }

        let output = child.wait_with_output()?;
        if !output.status.success() {
            return Err(AppError::UnsupportedMedia(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        let mime = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if mime.is_empty() {
            return Ok(UNKNOWN_MIME.to_string());
        }
        Ok(mime)
    }
}

/// Build the detector selected in `config`.
///
/// Asking for magika in a build without the `magika` feature falls back to
/// the signature detector.
pub fn build_detector(config: &Config) -> Arc<dyn TypeDetector> {
    match config.detector {
        DetectorKind::Signature => Arc::new(SignatureDetector),
        DetectorKind::File => Arc::new(FileCommandDetector::default()),
        #[cfg(feature = "magika")]
        DetectorKind::Magika => Arc::new(super::magika::MagikaDetector::default()),
        #[cfg(not(feature = "magika"))]
        DetectorKind::Magika => {
            tracing::warn!(
                "TYPE_DETECTOR=magika requires the `magika` feature; using signature detection"
            );
            Arc::new(SignatureDetector)
        }
    }
}
