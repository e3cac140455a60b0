//! Bulk export/import/validate of the full config set — connections, sync
//! configs, and table mappings — as one JSON document. Re-importing an
//! exported document is idempotent.

use axum::extract::Extension;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::envelope::Envelope;
use crate::api::AppState;
use crate::error::{AppError, AppResult};
use crate::models::{Connection, SyncConfig, TableMapping};

#[derive(Debug, Serialize, Deserialize)]
pub struct ConfigDocument {
    pub connections: Vec<Connection>,
    pub sync_configs: Vec<SyncConfig>,
    pub table_mappings: Vec<TableMapping>,
}

pub async fn export(Extension(state): Extension<AppState>) -> AppResult<Envelope<ConfigDocument>> {
    let connections = state.repository.list_connections().await?;
    let sync_configs = state.repository.list_sync_configs(None).await?;

    let mut table_mappings = Vec::new();
    for config in &sync_configs {
        table_mappings.extend(state.repository.list_table_mappings(config.id).await?);
    }

    Ok(Envelope::ok(ConfigDocument {
        connections,
        sync_configs,
        table_mappings,
    }))
}

pub async fn import(
    Extension(state): Extension<AppState>,
    Json(doc): Json<ConfigDocument>,
) -> AppResult<Envelope<ConfigDocument>> {
    validate_document(&doc)?;

    for connection in &doc.connections {
        if state.repository.get_connection(connection.id).await.is_ok() {
            state.repository.update_connection(connection.clone()).await?;
        } else {
            state.repository.create_connection(connection.clone()).await?;
        }
    }
    for config in &doc.sync_configs {
        if state.repository.get_sync_config(config.id).await.is_ok() {
            state.repository.update_sync_config(config.clone()).await?;
        } else {
            state.repository.create_sync_config(config.clone()).await?;
        }
    }
    for mapping in &doc.table_mappings {
        if state.repository.get_table_mapping(mapping.id).await.is_ok() {
            state.repository.update_table_mapping(mapping.clone()).await?;
        } else {
            state.repository.create_table_mapping(mapping.clone()).await?;
        }
    }

    Ok(Envelope::ok(doc))
}

pub async fn validate(Json(doc): Json<ConfigDocument>) -> AppResult<Envelope<()>> {
    validate_document(&doc)?;
    Ok(Envelope::ok(()))
}

fn validate_document(doc: &ConfigDocument) -> AppResult<()> {
    let connection_ids: std::collections::HashSet<_> = doc.connections.iter().map(|c| c.id).collect();
    for config in &doc.sync_configs {
        if !connection_ids.contains(&config.connection_id) {
            return Err(AppError::Validation(format!(
                "sync config '{}' references unknown connection {}",
                config.name, config.connection_id
            )));
        }
    }

    let config_ids: std::collections::HashSet<_> = doc.sync_configs.iter().map(|c| c.id).collect();
    for mapping in &doc.table_mappings {
        if !config_ids.contains(&mapping.config_id) {
            return Err(AppError::Validation(format!(
                "table mapping '{}' references unknown config {}",
                mapping.source_table, mapping.config_id
            )));
        }
    }
    Ok(())
}
