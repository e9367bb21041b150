//! HTTP host for Blotter: JSON API over the ordering engine, draft machine,
//! and media pipeline, plus static serving of captured assets.

/// HTTP error mapping for API handlers.
pub mod error;
/// HTTP handlers for post, entry, draft, and capture endpoints.
pub mod handlers;

pub use blotter_core::{
    config, db, models, AppError, Config, Database, MediaPipeline, OrderingEngine,
    PostLockManager, DEFAULT_PORT,
};

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    routing::{get, post, put},
    Router,
};
use blotter_core::{BulkUploader, DraftMachine};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, CorsLayer},
    services::ServeDir,
    set_header::SetResponseHeaderLayer,
    trace::TraceLayer,
};

/// The single draft machine shared by every request.
pub type Drafts = DraftMachine<Database, Database>;

const CONTENT_SECURITY_POLICY: &str = "default-src 'self'; script-src 'self' 'unsafe-inline'; style-src 'self' 'unsafe-inline'; img-src 'self' data:; media-src 'self'; font-src 'self'; connect-src 'self'; frame-ancestors 'none'; base-uri 'self'; form-action 'self'";

/// Shared state passed to HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub config: Arc<Config>,
    pub locks: Arc<PostLockManager>,
    pub ordering: Arc<OrderingEngine<Database>>,
    pub drafts: Arc<Mutex<Drafts>>,
    pub media: Arc<MediaPipeline>,
    pub uploads: Arc<BulkUploader<Database>>,
}

impl AppState {
    /// Construct shared application state with the media pipeline from `config`.
    pub fn new(config: Config, db: Database) -> Self {
        let media = MediaPipeline::from_config(&config);
        Self::with_media(config, db, media)
    }

    /// Construct shared application state around a specific media pipeline.
    ///
    /// The ordering engine, the draft machine, and the uploader share one lock
    /// manager, so index writers on the same post are serialized.
    pub fn with_media(config: Config, db: Database, media: MediaPipeline) -> Self {
        let db = Arc::new(db);
        let locks = Arc::new(PostLockManager::default());
        let ordering = OrderingEngine::new(db.clone(), locks.clone());
        let drafts = DraftMachine::new(
            ordering.clone(),
            db.clone(),
            config.draft_persist_interval(),
        );
        let uploads = BulkUploader::new(
            ordering.clone(),
            media.blobs().clone(),
            config.max_payload_size,
        );
        Self {
            db,
            config: Arc::new(config),
            locks,
            ordering: Arc::new(ordering),
            drafts: Arc::new(Mutex::new(drafts)),
            media: Arc::new(media),
            uploads: Arc::new(uploads),
        }
    }

    /// Lock the draft machine.
    ///
    /// # Errors
    /// Returns [`AppError::StorageMessage`] when a previous holder panicked.
    pub fn lock_drafts(&self) -> Result<MutexGuard<'_, Drafts>, AppError> {
        self.drafts
            .lock()
            .map_err(|_| AppError::StorageMessage("Draft state is unavailable.".to_string()))
    }
}

/// Create the application router with all routes and middleware.
pub fn create_app(state: AppState, allow_public_access: bool) -> Router {
    let cors_port = state.config.port;
    create_app_with_cors_port(state, allow_public_access, cors_port)
}

/// Resolve the listener address from env var overrides and security policy.
///
/// # Returns
/// A validated socket address that enforces loopback when public access is disabled.
pub fn resolve_bind_address(config: &Config, allow_public_access: bool) -> SocketAddr {
    let default_bind = SocketAddr::from(([127, 0, 0, 1], config.port));
    let requested = match std::env::var("BIND") {
        Ok(value) => match value.trim().parse::<SocketAddr>() {
            Ok(addr) => addr,
            Err(err) => {
                tracing::warn!(
                    "Invalid BIND='{}': {}. Falling back to {}",
                    value,
                    err,
                    default_bind
                );
                default_bind
            }
        },
        Err(_) => default_bind,
    };

    if allow_public_access || requested.ip().is_loopback() {
        return requested;
    }

    tracing::warn!(
        "Non-loopback bind {} requested without ALLOW_PUBLIC_ACCESS; forcing 127.0.0.1",
        requested
    );
    SocketAddr::from(([127, 0, 0, 1], requested.port()))
}

fn create_app_with_cors_port(state: AppState, allow_public_access: bool, cors_port: u16) -> Router {
    let methods = [Method::GET, Method::POST, Method::PUT, Method::DELETE];
    let cors = if allow_public_access {
        CorsLayer::new()
            .allow_origin(tower_http::cors::Any)
            .allow_methods(methods)
            .allow_headers(tower_http::cors::Any)
    } else {
        let origins: Vec<HeaderValue> = [
            format!("http://localhost:{}", cors_port),
            format!("http://127.0.0.1:{}", cors_port),
        ]
        .into_iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(methods)
            .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
    };

    Router::new()
        .route("/api/post", post(handlers::posts::create_post))
        .route("/api/posts", get(handlers::posts::list_posts))
        .route(
            "/api/post/:id",
            get(handlers::posts::get_post)
                .put(handlers::posts::update_post)
                .delete(handlers::posts::delete_post),
        )
        .route("/api/post/:id/entry", post(handlers::entries::insert_entry))
        .route("/api/post/:id/capture", post(handlers::capture::capture_media))
        .route("/api/post/:id/upload", post(handlers::uploads::upload_files))
        .route("/api/entry/:id", get(handlers::entries::get_entry))
        .route("/api/entry/:id/index", put(handlers::entries::move_entry))
        .route("/api/draft", get(handlers::drafts::get_draft))
        .route("/api/draft/bind", post(handlers::drafts::bind_post))
        .route("/api/draft/edit", post(handlers::drafts::start_edit))
        .route("/api/draft/new", post(handlers::drafts::start_new))
        .route("/api/draft/markdown", put(handlers::drafts::set_markdown))
        .route("/api/draft/commit", post(handlers::drafts::commit))
        .route("/api/draft/cancel", post(handlers::drafts::cancel))
        .nest_service(
            &format!("/{}", blotter_core::CAPTURE_ROUTE_PREFIX),
            ServeDir::new(&state.config.asset_dir),
        )
        .with_state(state.clone())
        .layer(
            tower::ServiceBuilder::new()
                .layer(DefaultBodyLimit::max(state.config.max_request_body_bytes()))
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(cors)
                .layer(SetResponseHeaderLayer::overriding(
                    header::CONTENT_SECURITY_POLICY,
                    HeaderValue::from_static(CONTENT_SECURITY_POLICY),
                ))
                .layer(SetResponseHeaderLayer::overriding(
                    header::X_CONTENT_TYPE_OPTIONS,
                    HeaderValue::from_static("nosniff"),
                ))
                .layer(SetResponseHeaderLayer::overriding(
                    header::X_FRAME_OPTIONS,
                    HeaderValue::from_static("DENY"),
                )),
        )
}

fn listener_cors_port(listener: &tokio::net::TcpListener, fallback_port: u16) -> u16 {
    listener
        .local_addr()
        .map(|addr| addr.port())
        .unwrap_or(fallback_port)
}

/// Run the Axum server with graceful shutdown support.
///
/// # Errors
/// Returns any I/O error produced by `axum::serve`.
pub async fn serve_router(
    listener: tokio::net::TcpListener,
    state: AppState,
    allow_public_access: bool,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<(), std::io::Error> {
    let cors_port = listener_cors_port(&listener, state.config.port);
    let app = create_app_with_cors_port(state, allow_public_access, cors_port);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await
}

/// Write dirty draft text to draft persistence once per `period`.
pub fn spawn_draft_flusher(state: AppState, period: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period.max(Duration::from_millis(100)));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let flushed = state.lock_drafts().and_then(|mut drafts| drafts.flush());
            match flushed {
                Ok(true) => tracing::debug!("draft flushed"),
                Ok(false) => {}
                Err(err) => tracing::warn!("Draft flush failed: {}", err),
            }
        }
    })
}

/// Commit the in-flight draft on the way out.
///
/// Best effort: a failure is logged and the process exits anyway.
pub fn commit_on_shutdown(state: &AppState) {
    let committed = state.lock_drafts().and_then(|mut drafts| drafts.commit());
    match committed {
        Ok(outcome) => tracing::info!(?outcome, "draft committed on shutdown"),
        Err(err) => tracing::warn!("Draft commit on shutdown failed: {}", err),
    }
}
