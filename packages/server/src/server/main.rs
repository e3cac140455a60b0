// Main entry point for the sync control plane.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use sqlx::mysql::MySqlPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sync_core::api::{self, AppState};
use sync_core::config::{CliArgs, Config};
use sync_core::connection_manager::ConnectionManager;
use sync_core::job_engine::JobEngine;
use sync_core::monitor::Monitor;
use sync_core::repository::MySqlRepository;
use sync_core::sync_engine::SyncEngine;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,sync_core=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("starting sync control plane");

    let config = Config::load(CliArgs::parse()).context("failed to load configuration")?;
    tracing::info!(port = config.port, "configuration loaded");

    tracing::info!("connecting to local control-plane database...");
    let local_pool = MySqlPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(config.connection_acquire_timeout())
        .connect(&config.local_database_url)
        .await
        .context("failed to connect to local control-plane database")?;
    tracing::info!("local database connected");

    tracing::info!("running schema migrations...");
    sqlx::migrate!("../../migrations")
        .run(&local_pool)
        .await
        .context("failed to run schema migrations")?;
    tracing::info!("migrations complete");

    let config = Arc::new(config);
    let repository: Arc<dyn sync_core::repository::Repository> =
        Arc::new(MySqlRepository::new(local_pool.clone()));
    let connection_manager = Arc::new(ConnectionManager::new(
        local_pool.clone(),
        config.local_pool_max_connections,
        config.connection_acquire_timeout(),
    ));
    let monitor = Arc::new(Monitor::new());
    let sync_engine = Arc::new(SyncEngine::new());

    let job_engine = Arc::new(JobEngine::new(
        Arc::clone(&repository),
        Arc::clone(&connection_manager),
        Arc::clone(&monitor),
        Arc::clone(&sync_engine),
        Arc::clone(&config),
    ));

    if config.sync_enabled {
        job_engine.start().await;
    } else {
        tracing::warn!("sync.enabled is false; job engine will not start");
    }

    let app_state = AppState {
        repository,
        connection_manager: Arc::clone(&connection_manager),
        monitor,
        job_engine: Arc::clone(&job_engine),
        config: Arc::clone(&config),
    };
    let app = api::build_router(app_state);

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!(%addr, "listening");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("failed to bind to address")?;

    let shutdown_timeout = config.shutdown_timeout();
    let serve = axum::serve(listener, app.into_make_service());
    tokio::select! {
        result = serve => result.context("server error")?,
        _ = shutdown_signal() => {
            tracing::info!("shutdown signal received, draining in-flight jobs");
        }
    }

    job_engine.stop(shutdown_timeout).await;
    connection_manager.shutdown(shutdown_timeout).await;
    tracing::info!("shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
