//! Configuration loading from environment variables.

use crate::constants::{DEFAULT_DRAFT_PERSIST_INTERVAL_MS, DEFAULT_MAX_PAYLOAD_SIZE, DEFAULT_PORT};
use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Which content-type detection capability the media pipeline uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectorKind {
    /// Built-in magic-byte signatures.
    Signature,
    /// External `file --mime-type` process.
    File,
    /// Magika model (requires the `magika` feature).
    Magika,
}

impl DetectorKind {
    /// Parse a detector name, case-insensitively.
    ///
    /// # Returns
    /// `Some(kind)` for a known name, otherwise `None`.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "signature" | "magic" => Some(Self::Signature),
            "file" => Some(Self::File),
            "magika" => Some(Self::Magika),
            _ => None,
        }
    }
}

/// Runtime configuration for Blotter.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub db_path: String,
    pub asset_dir: String,
    pub port: u16,
    pub max_payload_size: usize,
    pub draft_persist_interval_ms: u64,
    pub detector: DetectorKind,
    pub ffmpeg_path: String,
    pub transcode_previews: bool,
    pub public_base_url: String,
}

/// Expand tilde (~) in paths to the user's home directory
fn expand_tilde(path: String) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = resolve_home_dir() {
            return home.join(rest).to_string_lossy().to_string();
        }
    }
    path
}

fn resolve_home_dir() -> Option<PathBuf> {
    if let Ok(home) = env::var("HOME") {
        if !home.trim().is_empty() {
            return Some(PathBuf::from(home));
        }
    }

    if let Ok(profile) = env::var("USERPROFILE") {
        if !profile.trim().is_empty() {
            return Some(PathBuf::from(profile));
        }
    }

    std::env::current_dir().ok()
}

fn default_data_dir(leaf: &str) -> String {
    let home = resolve_home_dir().unwrap_or_else(|| PathBuf::from("."));
    home.join(".cache")
        .join("blotter")
        .join(leaf)
        .to_string_lossy()
        .to_string()
}

/// Parse a boolean-like environment flag value.
///
/// # Supported Values
/// - Truthy: `1`, `true`, `yes`, `on`
/// - Falsy: `0`, `false`, `no`, `off`, empty string
///
/// Matching is case-insensitive and ignores surrounding whitespace.
///
/// # Returns
/// `Some(bool)` when the value is recognized, otherwise `None`.
pub fn parse_env_flag(value: &str) -> Option<bool> {
    let normalized = value.trim().to_ascii_lowercase();
    match normalized.as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "" | "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Read a boolean flag from the environment.
///
/// Missing or unrecognized values are treated as `false`.
pub fn env_flag_enabled(name: &str) -> bool {
    env::var(name)
        .ok()
        .and_then(|value| parse_env_flag(&value))
        .unwrap_or(false)
}

fn env_flag_or(name: &str, default: bool) -> bool {
    env::var(name)
        .ok()
        .and_then(|value| parse_env_flag(&value))
        .unwrap_or(default)
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Returns
    /// A populated [`Config`] with defaults applied when env vars are missing.
    pub fn from_env() -> Self {
        let port = env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(DEFAULT_PORT);
        let detector = match env::var("TYPE_DETECTOR") {
            Ok(value) => DetectorKind::parse(&value).unwrap_or_else(|| {
                tracing::warn!(
                    "Unknown TYPE_DETECTOR='{}'; falling back to signature detection",
                    value
                );
                DetectorKind::Signature
            }),
            Err(_) => DetectorKind::Signature,
        };

        Self {
            db_path: env::var("DB_PATH")
                .map(expand_tilde)
                .unwrap_or_else(|_| default_data_dir("db")),
            asset_dir: env::var("ASSET_DIR")
                .map(expand_tilde)
                .unwrap_or_else(|_| default_data_dir("assets")),
            port,
            max_payload_size: env::var("MAX_PAYLOAD_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_MAX_PAYLOAD_SIZE),
            draft_persist_interval_ms: env::var("DRAFT_PERSIST_INTERVAL")
                .ok()
                .and_then(|i| i.parse().ok())
                .unwrap_or(DEFAULT_DRAFT_PERSIST_INTERVAL_MS),
            detector,
            ffmpeg_path: env::var("FFMPEG_PATH")
                .ok()
                .filter(|value| !value.trim().is_empty())
                .unwrap_or_else(|| "ffmpeg".to_string()),
            transcode_previews: env_flag_or("TRANSCODE_PREVIEWS", true),
            public_base_url: env::var("PUBLIC_BASE_URL")
                .ok()
                .map(|url| url.trim_end_matches('/').to_string())
                .filter(|url| !url.is_empty())
                .unwrap_or_else(|| format!("http://localhost:{}", port)),
        }
    }

    /// Delay between persisted draft refreshes.
    pub fn draft_persist_interval(&self) -> Duration {
        Duration::from_millis(self.draft_persist_interval_ms)
    }

    /// Upper bound for an encoded request body carrying a media payload.
    ///
    /// Base64 inflates payloads by 4/3; the extra slack covers the data URL
    /// prefix and JSON framing.
    pub fn max_request_body_bytes(&self) -> usize {
        self.max_payload_size
            .saturating_mul(4)
            .saturating_div(3)
            .saturating_add(64 * 1024)
    }
}
