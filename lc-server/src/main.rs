//! lc-server - LifeCurriculum web service
//!
//! Learning curricula built from YouTube videos, team collaboration, and
//! admin moderation, served over a role-gated HTTP API with per-session
//! realtime state push.

use anyhow::Result;
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::info;

use lc_common::config::ServerConfig;
use lc_common::events::EventBus;
use lc_server::db::{self, Store};
use lc_server::youtube::YouTubeClient;
use lc_server::{build_router, AppState};

#[derive(Debug, Parser)]
#[command(name = "lc-server", about = "LifeCurriculum web service")]
struct Args {
    /// Data folder holding the SQLite database
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Address and port to listen on
    #[arg(long)]
    bind: Option<SocketAddr>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    // Build identification immediately after tracing init, before any
    // database delays
    info!(
        "Starting LifeCurriculum (lc-server) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let args = Args::parse();
    let config = ServerConfig::resolve(args.data_dir.as_deref(), args.bind)?;
    config.ensure_data_dir()?;

    let db_path = config.database_path();
    info!("Database path: {}", db_path.display());

    let pool = db::connect(&db_path).await?;
    let bus = EventBus::new(256);
    let store = Store::new(pool, bus);

    if config.youtube_api_key.is_none() {
        info!("No YouTube API key configured; search will return placeholders");
    }
    let youtube = YouTubeClient::new(config.youtube_api_key.clone());

    let state = AppState::new(store, youtube);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    info!("lc-server listening on http://{}", config.bind);
    info!("Health check: http://{}/health", config.bind);

    axum::serve(listener, app).await?;

    Ok(())
}
