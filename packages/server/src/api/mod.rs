//! Thin REST control-plane surface over the core. This layer
//! never holds business logic: handlers validate input, call into
//! `JobEngine`/`Repository`/`ConnectionManager`, and wrap the result in the
//! common envelope.

pub mod envelope;
mod routes;

use std::sync::Arc;
use std::time::Duration;

use axum::extract::Extension;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::connection_manager::ConnectionManager;
use crate::job_engine::JobEngine;
use crate::monitor::Monitor;
use crate::repository::Repository;

/// Shared handles every handler needs. Cloning is cheap — everything inside
/// is an `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub repository: Arc<dyn Repository>,
    pub connection_manager: Arc<ConnectionManager>,
    pub monitor: Arc<Monitor>,
    pub job_engine: Arc<JobEngine>,
    pub config: Arc<Config>,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route(
            "/api/sync/connections",
            get(routes::connections::list).post(routes::connections::create),
        )
        .route(
            "/api/sync/connections/:id",
            get(routes::connections::get)
                .put(routes::connections::update)
                .delete(routes::connections::delete),
        )
        .route(
            "/api/sync/connections/:id/test",
            post(routes::connections::test),
        )
        .route(
            "/api/sync/configs",
            get(routes::configs::list).post(routes::configs::create),
        )
        .route(
            "/api/sync/configs/:id",
            get(routes::configs::get)
                .put(routes::configs::update)
                .delete(routes::configs::delete),
        )
        .route(
            "/api/sync/jobs",
            get(routes::jobs::list).post(routes::jobs::submit),
        )
        .route("/api/sync/jobs/active", get(routes::jobs::active))
        .route("/api/sync/jobs/history", get(routes::jobs::history))
        .route("/api/sync/jobs/:id", get(routes::jobs::get))
        .route("/api/sync/jobs/:id/stop", post(routes::jobs::stop))
        .route("/api/sync/jobs/:id/logs", get(routes::jobs::logs))
        .route("/api/sync/status", get(routes::status::status))
        .route("/api/sync/stats", get(routes::status::stats))
        .route(
            "/api/sync/config/export",
            get(routes::config_io::export),
        )
        .route(
            "/api/sync/config/import",
            post(routes::config_io::import),
        )
        .route(
            "/api/sync/config/validate",
            post(routes::config_io::validate),
        )
        .route("/health", get(routes::health::health))
        .layer(Extension(state))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

pub fn shutdown_timeout(config: &Config) -> Duration {
    config.shutdown_timeout()
}
