//! Durable store for connections, configs, table mappings, jobs, per-row job
//! logs, and per-table checkpoints.

mod memory;
mod mysql;

pub use memory::InMemoryRepository;
pub use mysql::MySqlRepository;

use async_trait::async_trait;
use uuid::Uuid;

use crate::models::{Connection, LogLevel, SyncCheckpoint, SyncConfig, SyncJob, SyncLog, TableMapping};

/// Filters accepted by `list_jobs`, mirroring the `GET /api/sync/jobs` query
/// parameters accepted by the jobs list endpoint.
#[derive(Debug, Clone, Default)]
pub struct JobListFilter {
    pub status: Option<crate::models::JobStatus>,
    pub config_id: Option<Uuid>,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Clone, Default)]
pub struct LogListFilter {
    pub level: Option<LogLevel>,
    pub limit: i64,
}

/// Contract: every mutation is atomic; cascading deletes match the
/// relational schema; name-based uniqueness violations surface as
/// [`RepositoryError::Conflict`] so callers can map them to HTTP 409.
#[async_trait]
pub trait Repository: Send + Sync {
    // -- connections --------------------------------------------------
    async fn create_connection(&self, connection: Connection) -> Result<Connection, RepositoryError>;
    async fn get_connection(&self, id: Uuid) -> Result<Connection, RepositoryError>;
    async fn list_connections(&self) -> Result<Vec<Connection>, RepositoryError>;
    async fn update_connection(&self, connection: Connection) -> Result<Connection, RepositoryError>;
    async fn delete_connection(&self, id: Uuid) -> Result<(), RepositoryError>;

    // -- sync configs ---------------------------------------------------
    async fn create_sync_config(&self, config: SyncConfig) -> Result<SyncConfig, RepositoryError>;
    async fn get_sync_config(&self, id: Uuid) -> Result<SyncConfig, RepositoryError>;
    async fn list_sync_configs(
        &self,
        connection_id: Option<Uuid>,
    ) -> Result<Vec<SyncConfig>, RepositoryError>;
    async fn update_sync_config(&self, config: SyncConfig) -> Result<SyncConfig, RepositoryError>;
    async fn delete_sync_config(&self, id: Uuid) -> Result<(), RepositoryError>;

    // -- table mappings ---------------------------------------------------
    async fn create_table_mapping(&self, mapping: TableMapping) -> Result<TableMapping, RepositoryError>;
    async fn get_table_mapping(&self, id: Uuid) -> Result<TableMapping, RepositoryError>;
    /// Enabled mappings for a config, ordered by `sort_order`.
    async fn list_enabled_table_mappings(
        &self,
        config_id: Uuid,
    ) -> Result<Vec<TableMapping>, RepositoryError>;
    async fn list_table_mappings(&self, config_id: Uuid) -> Result<Vec<TableMapping>, RepositoryError>;
    async fn update_table_mapping(&self, mapping: TableMapping) -> Result<TableMapping, RepositoryError>;
    async fn delete_table_mapping(&self, id: Uuid) -> Result<(), RepositoryError>;

    // -- jobs ---------------------------------------------------------
    async fn create_job(&self, job: SyncJob) -> Result<SyncJob, RepositoryError>;
    async fn get_job(&self, id: Uuid) -> Result<SyncJob, RepositoryError>;
    /// Row-missing is tolerated here: the caller (Monitor cleanup) treats
    /// it as non-fatal.
    async fn update_job(&self, job: SyncJob) -> Result<SyncJob, RepositoryError>;
    async fn list_pending_jobs(&self) -> Result<Vec<SyncJob>, RepositoryError>;
    async fn list_jobs(&self, filter: JobListFilter) -> Result<Vec<SyncJob>, RepositoryError>;
    /// Deletes terminal (completed/failed/cancelled) jobs that ended before
    /// `older_than`, cascading to their logs. Returns the number removed.
    async fn delete_terminal_jobs_before(
        &self,
        older_than: chrono::DateTime<chrono::Utc>,
    ) -> Result<u64, RepositoryError>;

    // -- logs -----------------------------------------------------------
    async fn append_log(&self, log: SyncLog) -> Result<(), RepositoryError>;
    async fn list_logs(&self, job_id: Uuid, filter: LogListFilter) -> Result<Vec<SyncLog>, RepositoryError>;

    // -- checkpoints ------------------------------------------------------
    async fn get_checkpoint(&self, table_mapping_id: Uuid) -> Result<Option<SyncCheckpoint>, RepositoryError>;
    /// Atomically creates-or-advances the checkpoint for a mapping.
    async fn upsert_checkpoint(
        &self,
        table_mapping_id: Uuid,
        last_sync_value: Option<String>,
        checkpoint_data: Option<serde_json::Value>,
    ) -> Result<SyncCheckpoint, RepositoryError>;
}

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("entity not found")]
    NotFound,
    #[error("conflict: {0}")]
    Conflict(String),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl RepositoryError {
    /// Map a raw `sqlx::Error` to `Conflict` when it looks like a unique-key
    /// violation, `NotFound` for `RowNotFound`, else pass through as
    /// `Database`. MySQL reports duplicate keys as error code 1062.
    pub fn from_sqlx(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => RepositoryError::NotFound,
            sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("1062") => {
                RepositoryError::Conflict(db_err.message().to_string())
            }
            _ => RepositoryError::Database(err),
        }
    }
}
