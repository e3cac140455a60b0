use axum::extract::{Extension, Path};
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use crate::api::envelope::Envelope;
use crate::api::AppState;
use crate::error::{AppError, AppResult};
use crate::models::Connection;

#[derive(Debug, Deserialize)]
pub struct CreateConnectionRequest {
    pub name: String,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub source_database: String,
    pub local_db_name: String,
    #[serde(default)]
    pub tls: bool,
}

pub async fn list(Extension(state): Extension<AppState>) -> AppResult<Envelope<Vec<Connection>>> {
    let connections = state.repository.list_connections().await?;
    Ok(Envelope::ok(connections))
}

pub async fn get(
    Extension(state): Extension<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Envelope<Connection>> {
    let connection = state.repository.get_connection(id).await?;
    Ok(Envelope::ok(connection))
}

pub async fn create(
    Extension(state): Extension<AppState>,
    Json(body): Json<CreateConnectionRequest>,
) -> AppResult<Envelope<Connection>> {
    if body.name.trim().is_empty() {
        return Err(AppError::Validation("connection name must not be empty".into()));
    }
    let connection = Connection::builder()
        .name(body.name)
        .host(body.host)
        .port(body.port)
        .user(body.user)
        .encrypted_password(body.password)
        .source_database(body.source_database)
        .local_db_name(body.local_db_name)
        .tls(body.tls)
        .build();
    let created = state.repository.create_connection(connection).await?;
    Ok(Envelope::ok(created))
}

pub async fn update(
    Extension(state): Extension<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<CreateConnectionRequest>,
) -> AppResult<Envelope<Connection>> {
    let mut connection = state.repository.get_connection(id).await?;
    connection.name = body.name;
    connection.host = body.host;
    connection.port = body.port;
    connection.user = body.user;
    connection.encrypted_password = body.password;
    connection.source_database = body.source_database;
    connection.local_db_name = body.local_db_name;
    connection.tls = body.tls;
    let updated = state.repository.update_connection(connection).await?;
    state.connection_manager.evict(id).await;
    Ok(Envelope::ok(updated))
}

pub async fn delete(
    Extension(state): Extension<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Envelope<()>> {
    state.repository.delete_connection(id).await?;
    state.connection_manager.evict(id).await;
    Ok(Envelope::ok(()))
}

pub async fn test(
    Extension(state): Extension<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Envelope<crate::connection_manager::ConnectionTestResult>> {
    let connection = state.repository.get_connection(id).await?;
    let result = state.connection_manager.test_connection(&connection).await;
    Ok(Envelope::ok(result))
}
