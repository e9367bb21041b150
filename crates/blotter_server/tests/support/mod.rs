//! Shared integration-test server bootstrap helpers.

use axum_test::TestServer;
use blotter_core::config::DetectorKind;
use blotter_core::media::{
    FfmpegTranscoder, LocalBlobStore, NoopTranscoder, SignatureDetector, Transcoder,
};
use blotter_server::{create_app, AppState, Config, Database, MediaPipeline};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

pub(crate) fn test_config_for_dir(dir: &Path) -> Config {
    Config {
        db_path: dir.join("db").to_str().expect("db path").to_string(),
        asset_dir: dir.join("assets").to_str().expect("asset path").to_string(),
        port: 0,
        max_payload_size: 1024 * 1024,
        draft_persist_interval_ms: 0,
        detector: DetectorKind::Signature,
        ffmpeg_path: "ffmpeg".to_string(),
        transcode_previews: false,
        public_base_url: "http://localhost:38520".to_string(),
    }
}

pub(crate) fn test_server_with_transcoder(
    config: Config,
    transcoder: Arc<dyn Transcoder>,
) -> (TestServer, AppState) {
    let db = Database::new(config.db_path.as_str()).expect("open db");
    let media = MediaPipeline::new(
        Arc::new(LocalBlobStore::new(&config.asset_dir)),
        Arc::new(SignatureDetector),
        transcoder,
        config.max_payload_size,
    );
    let state = AppState::with_media(config, db, media);
    let app = create_app(state.clone(), false);
    let server = TestServer::new(app).expect("server");
    (server, state)
}

pub(crate) fn setup_test_server() -> (TestServer, TempDir, AppState) {
    let temp_dir = TempDir::new().expect("temp dir");
    let config = test_config_for_dir(temp_dir.path());
    let (server, state) = test_server_with_transcoder(config, Arc::new(NoopTranscoder));
    (server, temp_dir, state)
}

/// Server whose video previews always fail (ffmpeg path does not exist).
pub(crate) fn setup_test_server_with_broken_ffmpeg() -> (TestServer, TempDir, AppState) {
    let temp_dir = TempDir::new().expect("temp dir");
    let config = test_config_for_dir(temp_dir.path());
    let transcoder = Arc::new(FfmpegTranscoder::new("/nonexistent/bin/ffmpeg"));
    let (server, state) = test_server_with_transcoder(config, transcoder);
    (server, temp_dir, state)
}
