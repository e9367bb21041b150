//! Blotter server entrypoint.

use blotter_core::DEFAULT_PORT;
use blotter_server::{
    commit_on_shutdown, config::Config, db::Database, serve_router, spawn_draft_flusher, AppState,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct CliFlags {
    help: bool,
}

fn parse_cli_flags(args: &[String]) -> anyhow::Result<CliFlags> {
    let mut flags = CliFlags::default();
    for arg in args.iter().skip(1) {
        match arg.as_str() {
            "--help" | "-h" => flags.help = true,
            value if value.starts_with('-') => {
                anyhow::bail!(
                    "Unknown option: '{}'. Use --help to see supported options.",
                    value
                );
            }
            value => {
                anyhow::bail!(
                    "Unexpected positional argument: '{}'. Use --help to see supported options.",
                    value
                );
            }
        }
    }
    Ok(flags)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "blotter=info,tower_http=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args: Vec<String> = std::env::args().collect();
    if parse_cli_flags(&args)?.help {
        print_help();
        return Ok(());
    }

    let config = Config::from_env();
    let database = Database::new(&config.db_path)?;
    std::fs::create_dir_all(&config.asset_dir)?;
    let state = AppState::new(config.clone(), database);

    let allow_public = blotter_server::config::env_flag_enabled("ALLOW_PUBLIC_ACCESS");
    if allow_public {
        tracing::warn!("Public access enabled - server will accept requests from any origin");
    }

    let bind_addr = blotter_server::resolve_bind_address(&config, allow_public);
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    let actual_addr = listener.local_addr().unwrap_or(bind_addr);
    tracing::info!(
        assets = %config.asset_dir,
        detector = ?config.detector,
        "Blotter running at http://{}",
        actual_addr
    );

    let flusher = spawn_draft_flusher(state.clone(), config.draft_persist_interval());
    let serve_result = serve_router(listener, state.clone(), allow_public, shutdown_signal()).await;

    flusher.abort();
    commit_on_shutdown(&state);
    if let Err(err) = state.db.flush() {
        tracing::error!("Failed to flush database: {}", err);
    }

    serve_result?;
    Ok(())
}

fn print_help() {
    println!("Blotter Server\n");
    println!("Usage: blotter [OPTIONS]\n");
    println!("Options:");
    println!("  --help                Show this help message");
    println!("\nEnvironment variables:");
    println!("  DB_PATH               Database directory (default: ~/.cache/blotter/db)");
    println!("  ASSET_DIR             Captured media directory (default: ~/.cache/blotter/assets)");
    println!("  PORT                  Server port (default: {})", DEFAULT_PORT);
    println!("  MAX_PAYLOAD_SIZE      Maximum decoded media size in bytes (default: 25MB)");
    println!("  DRAFT_PERSIST_INTERVAL  Draft persistence delay in ms (default: 2000)");
    println!("  TYPE_DETECTOR         signature | file | magika (default: signature)");
    println!("  FFMPEG_PATH           ffmpeg binary for video previews (default: ffmpeg)");
    println!("  TRANSCODE_PREVIEWS    Derive GIF previews for videos (default: true)");
    println!("  PUBLIC_BASE_URL       Base URL used in image markdown");
    println!("  ALLOW_PUBLIC_ACCESS   Allow CORS from any origin");
    println!(
        "  BIND                  Override bind address (e.g. 0.0.0.0:{})",
        DEFAULT_PORT
    );
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!("Failed to install SIGTERM handler: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown requested");
}
