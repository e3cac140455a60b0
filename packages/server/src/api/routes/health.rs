use axum::extract::Extension;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use crate::api::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    status: String,
    local_database: String,
    active_jobs: usize,
}

/// Liveness probe: the local control-plane pool must answer `SELECT 1`.
pub async fn health(Extension(state): Extension<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let db_ok = sqlx::query("SELECT 1")
        .execute(state.connection_manager.local_pool())
        .await
        .is_ok();

    let status = if db_ok { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (
        status,
        Json(HealthResponse {
            status: if db_ok { "healthy" } else { "unhealthy" }.to_string(),
            local_database: if db_ok { "ok" } else { "unreachable" }.to_string(),
            active_jobs: state.monitor.get_active_jobs().len(),
        }),
    )
}
