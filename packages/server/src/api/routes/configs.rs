use axum::extract::{Extension, Path, Query};
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::api::envelope::Envelope;
use crate::api::AppState;
use crate::error::{AppError, AppResult};
use crate::models::{SyncConfig, SyncMode, SyncOptions};

#[derive(Debug, Deserialize)]
pub struct ListConfigsQuery {
    pub connection_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct UpsertConfigRequest {
    pub connection_id: Uuid,
    pub name: String,
    #[serde(default)]
    pub default_sync_mode: SyncMode,
    pub schedule: Option<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub options: SyncOptions,
    pub source_db: String,
    pub target_db: String,
}

fn default_true() -> bool {
    true
}

pub async fn list(
    Extension(state): Extension<AppState>,
    Query(query): Query<ListConfigsQuery>,
) -> AppResult<Envelope<Vec<SyncConfig>>> {
    let configs = state.repository.list_sync_configs(query.connection_id).await?;
    Ok(Envelope::ok(configs))
}

pub async fn get(
    Extension(state): Extension<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Envelope<SyncConfig>> {
    let config = state.repository.get_sync_config(id).await?;
    Ok(Envelope::ok(config))
}

pub async fn create(
    Extension(state): Extension<AppState>,
    Json(body): Json<UpsertConfigRequest>,
) -> AppResult<Envelope<SyncConfig>> {
    if body.name.trim().is_empty() {
        return Err(AppError::Validation("config name must not be empty".into()));
    }
    // Fails with `NotFound` if the connection id is dangling: a config
    // must reference a live Connection.
    state.repository.get_connection(body.connection_id).await?;

    let mut config = SyncConfig::builder()
        .connection_id(body.connection_id)
        .name(body.name)
        .default_sync_mode(body.default_sync_mode)
        .enabled(body.enabled)
        .options(sqlx::types::Json(body.options))
        .source_db(body.source_db)
        .target_db(body.target_db)
        .build();
    config.schedule = body.schedule;
    let created = state.repository.create_sync_config(config).await?;
    Ok(Envelope::ok(created))
}

pub async fn update(
    Extension(state): Extension<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<UpsertConfigRequest>,
) -> AppResult<Envelope<SyncConfig>> {
    let mut config = state.repository.get_sync_config(id).await?;
    config.connection_id = body.connection_id;
    config.name = body.name;
    config.default_sync_mode = body.default_sync_mode;
    config.schedule = body.schedule;
    config.enabled = body.enabled;
    config.options = sqlx::types::Json(body.options);
    config.source_db = body.source_db;
    config.target_db = body.target_db;
    let updated = state.repository.update_sync_config(config).await?;
    Ok(Envelope::ok(updated))
}

pub async fn delete(
    Extension(state): Extension<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Envelope<()>> {
    state.repository.delete_sync_config(id).await?;
    Ok(Envelope::ok(()))
}
