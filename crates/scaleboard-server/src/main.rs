//! Scaleboard server entry point.
//!
//! Loads configuration, opens the settings store, binds the live upstream
//! client to the persisted credentials and serves the API until SIGINT or
//! SIGTERM.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::{info, warn};

use scaleboard_server::app::build_router;
use scaleboard_server::config::ServerConfig;
use scaleboard_server::state::AppState;
use scaleboard_storage::FileBackend;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let dotenv = dotenvy::dotenv();

    let config = ServerConfig::from_env().context("invalid configuration")?;
    init_tracing(&config);

    if let Ok(path) = &dotenv {
        info!(path = %path.display(), "loaded environment file");
    }
    if config.uses_default_secret() {
        if config.environment.is_production() {
            warn!("SESSION_SECRET is the shipped default, stored API keys are not protected; set a unique secret");
        } else {
            info!("using the default SESSION_SECRET");
        }
    }

    let backend = FileBackend::open(&config.storage_path)
        .await
        .with_context(|| format!("storage path {} is not usable", config.storage_path.display()))?;
    let state = AppState::bootstrap(&config, Arc::new(backend)).await?;

    let app = build_router(state, &config);

    let listener = TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    info!(
        addr = %config.bind_addr,
        provider = %config.provider,
        static_dir = ?config.static_dir,
        "scaleboard server listening"
    );

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")?;

    info!("scaleboard server stopped");
    Ok(())
}

/// JSON logs in production, human-readable output in development.
/// `RUST_LOG` overrides the configured level.
fn init_tracing(config: &ServerConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level));

    if config.environment.is_production() {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .pretty()
            .init();
    }
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.ok();
    };

    #[cfg(unix)]
    let terminate = async {
        if let Ok(mut sig) =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        {
            sig.recv().await;
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("shutdown signal received, stopping server");
}
