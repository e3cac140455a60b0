use async_trait::async_trait;
use sqlx::MySqlPool;
use uuid::Uuid;

use crate::models::{
    Connection, JobStatus, LogLevel, SyncCheckpoint, SyncConfig, SyncJob, SyncLog, TableMapping,
};

use super::{JobListFilter, LogListFilter, Repository, RepositoryError};

/// sqlx-backed implementation of [`Repository`] against the local control-plane MySQL instance.
pub struct MySqlRepository {
    pool: MySqlPool,
}

impl MySqlRepository {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Repository for MySqlRepository {
    async fn create_connection(&self, connection: Connection) -> Result<Connection, RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO connections
                (id, name, host, port, user, encrypted_password, source_database, local_db_name, tls, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(connection.id)
        .bind(&connection.name)
        .bind(&connection.host)
        .bind(connection.port)
        .bind(&connection.user)
        .bind(&connection.encrypted_password)
        .bind(&connection.source_database)
        .bind(&connection.local_db_name)
        .bind(connection.tls)
        .bind(connection.created_at)
        .bind(connection.updated_at)
        .execute(&self.pool)
        .await
        .map_err(RepositoryError::from_sqlx)?;

        self.get_connection(connection.id).await
    }

    async fn get_connection(&self, id: Uuid) -> Result<Connection, RepositoryError> {
        sqlx::query_as::<_, Connection>("SELECT * FROM connections WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(RepositoryError::from_sqlx)?
            .ok_or(RepositoryError::NotFound)
    }

    async fn list_connections(&self) -> Result<Vec<Connection>, RepositoryError> {
        sqlx::query_as::<_, Connection>("SELECT * FROM connections ORDER BY created_at DESC")
            .fetch_all(&self.pool)
            .await
            .map_err(RepositoryError::from_sqlx)
    }

    async fn update_connection(&self, connection: Connection) -> Result<Connection, RepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE connections SET
                name = ?, host = ?, port = ?, user = ?, encrypted_password = ?,
                source_database = ?, local_db_name = ?, tls = ?, updated_at = NOW()
            WHERE id = ?
            "#,
        )
        .bind(&connection.name)
        .bind(&connection.host)
        .bind(connection.port)
        .bind(&connection.user)
        .bind(&connection.encrypted_password)
        .bind(&connection.source_database)
        .bind(&connection.local_db_name)
        .bind(connection.tls)
        .bind(connection.id)
        .execute(&self.pool)
        .await
        .map_err(RepositoryError::from_sqlx)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        self.get_connection(connection.id).await
    }

    async fn delete_connection(&self, id: Uuid) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM connections WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(RepositoryError::from_sqlx)?;
        Ok(())
    }

    async fn create_sync_config(&self, config: SyncConfig) -> Result<SyncConfig, RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO sync_configs
                (id, connection_id, name, default_sync_mode, schedule, enabled, options, source_db, target_db, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(config.id)
        .bind(config.connection_id)
        .bind(&config.name)
        .bind(config.default_sync_mode)
        .bind(&config.schedule)
        .bind(config.enabled)
        .bind(sqlx::types::Json(config.options.0.clone()))
        .bind(&config.source_db)
        .bind(&config.target_db)
        .bind(config.created_at)
        .bind(config.updated_at)
        .execute(&self.pool)
        .await
        .map_err(RepositoryError::from_sqlx)?;

        self.get_sync_config(config.id).await
    }

    async fn get_sync_config(&self, id: Uuid) -> Result<SyncConfig, RepositoryError> {
        sqlx::query_as::<_, SyncConfig>("SELECT * FROM sync_configs WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(RepositoryError::from_sqlx)?
            .ok_or(RepositoryError::NotFound)
    }

    async fn list_sync_configs(
        &self,
        connection_id: Option<Uuid>,
    ) -> Result<Vec<SyncConfig>, RepositoryError> {
        match connection_id {
            Some(id) => sqlx::query_as::<_, SyncConfig>(
                "SELECT * FROM sync_configs WHERE connection_id = ? ORDER BY created_at DESC",
            )
            .bind(id)
            .fetch_all(&self.pool)
            .await
            .map_err(RepositoryError::from_sqlx),
            None => sqlx::query_as::<_, SyncConfig>("SELECT * FROM sync_configs ORDER BY created_at DESC")
                .fetch_all(&self.pool)
                .await
                .map_err(RepositoryError::from_sqlx),
        }
    }

    async fn update_sync_config(&self, config: SyncConfig) -> Result<SyncConfig, RepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE sync_configs SET
                connection_id = ?, name = ?, default_sync_mode = ?, schedule = ?,
                enabled = ?, options = ?, source_db = ?, target_db = ?, updated_at = NOW()
            WHERE id = ?
            "#,
        )
        .bind(config.connection_id)
        .bind(&config.name)
        .bind(config.default_sync_mode)
        .bind(&config.schedule)
        .bind(config.enabled)
        .bind(sqlx::types::Json(config.options.0.clone()))
        .bind(&config.source_db)
        .bind(&config.target_db)
        .bind(config.id)
        .execute(&self.pool)
        .await
        .map_err(RepositoryError::from_sqlx)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        self.get_sync_config(config.id).await
    }

    async fn delete_sync_config(&self, id: Uuid) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM sync_configs WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(RepositoryError::from_sqlx)?;
        Ok(())
    }

    async fn create_table_mapping(&self, mapping: TableMapping) -> Result<TableMapping, RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO table_mappings
                (id, config_id, source_table, target_table, sync_mode, enabled, where_filter, watermark_column, sort_order, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(mapping.id)
        .bind(mapping.config_id)
        .bind(&mapping.source_table)
        .bind(&mapping.target_table)
        .bind(mapping.sync_mode)
        .bind(mapping.enabled)
        .bind(&mapping.where_filter)
        .bind(&mapping.watermark_column)
        .bind(mapping.sort_order)
        .bind(mapping.created_at)
        .bind(mapping.updated_at)
        .execute(&self.pool)
        .await
        .map_err(RepositoryError::from_sqlx)?;

        self.get_table_mapping(mapping.id).await
    }

    async fn get_table_mapping(&self, id: Uuid) -> Result<TableMapping, RepositoryError> {
        sqlx::query_as::<_, TableMapping>("SELECT * FROM table_mappings WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(RepositoryError::from_sqlx)?
            .ok_or(RepositoryError::NotFound)
    }

    async fn list_enabled_table_mappings(
        &self,
        config_id: Uuid,
    ) -> Result<Vec<TableMapping>, RepositoryError> {
        sqlx::query_as::<_, TableMapping>(
            "SELECT * FROM table_mappings WHERE config_id = ? AND enabled = TRUE ORDER BY sort_order ASC",
        )
        .bind(config_id)
        .fetch_all(&self.pool)
        .await
        .map_err(RepositoryError::from_sqlx)
    }

    async fn list_table_mappings(&self, config_id: Uuid) -> Result<Vec<TableMapping>, RepositoryError> {
        sqlx::query_as::<_, TableMapping>(
            "SELECT * FROM table_mappings WHERE config_id = ? ORDER BY sort_order ASC",
        )
        .bind(config_id)
        .fetch_all(&self.pool)
        .await
        .map_err(RepositoryError::from_sqlx)
    }

    async fn update_table_mapping(&self, mapping: TableMapping) -> Result<TableMapping, RepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE table_mappings SET
                source_table = ?, target_table = ?, sync_mode = ?, enabled = ?,
                where_filter = ?, watermark_column = ?, sort_order = ?, updated_at = NOW()
            WHERE id = ?
            "#,
        )
        .bind(&mapping.source_table)
        .bind(&mapping.target_table)
        .bind(mapping.sync_mode)
        .bind(mapping.enabled)
        .bind(&mapping.where_filter)
        .bind(&mapping.watermark_column)
        .bind(mapping.sort_order)
        .bind(mapping.id)
        .execute(&self.pool)
        .await
        .map_err(RepositoryError::from_sqlx)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        self.get_table_mapping(mapping.id).await
    }

    async fn delete_table_mapping(&self, id: Uuid) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM table_mappings WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(RepositoryError::from_sqlx)?;
        Ok(())
    }

    async fn create_job(&self, job: SyncJob) -> Result<SyncJob, RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO sync_jobs
                (id, config_id, status, created_at, start_time, end_time, total_tables, completed_tables, total_rows, processed_rows, error_message)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(job.id)
        .bind(job.config_id)
        .bind(job.status)
        .bind(job.created_at)
        .bind(job.start_time)
        .bind(job.end_time)
        .bind(job.total_tables)
        .bind(job.completed_tables)
        .bind(job.total_rows)
        .bind(job.processed_rows)
        .bind(&job.error_message)
        .execute(&self.pool)
        .await
        .map_err(RepositoryError::from_sqlx)?;

        self.get_job(job.id).await
    }

    async fn get_job(&self, id: Uuid) -> Result<SyncJob, RepositoryError> {
        sqlx::query_as::<_, SyncJob>("SELECT * FROM sync_jobs WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(RepositoryError::from_sqlx)?
            .ok_or(RepositoryError::NotFound)
    }

    async fn update_job(&self, job: SyncJob) -> Result<SyncJob, RepositoryError> {
        // Addressed by primary key; a missing row is surfaced as `NotFound`
        // so the Monitor can treat it as a non-fatal, logged condition.
        let result = sqlx::query(
            r#"
            UPDATE sync_jobs SET
                status = ?, start_time = ?, end_time = ?, total_tables = ?,
                completed_tables = ?, total_rows = ?, processed_rows = ?, error_message = ?
            WHERE id = ?
            "#,
        )
        .bind(job.status)
        .bind(job.start_time)
        .bind(job.end_time)
        .bind(job.total_tables)
        .bind(job.completed_tables)
        .bind(job.total_rows)
        .bind(job.processed_rows)
        .bind(&job.error_message)
        .bind(job.id)
        .execute(&self.pool)
        .await
        .map_err(RepositoryError::from_sqlx)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        self.get_job(job.id).await
    }

    async fn list_pending_jobs(&self) -> Result<Vec<SyncJob>, RepositoryError> {
        sqlx::query_as::<_, SyncJob>("SELECT * FROM sync_jobs WHERE status = ? ORDER BY created_at ASC")
            .bind(JobStatus::Pending)
            .fetch_all(&self.pool)
            .await
            .map_err(RepositoryError::from_sqlx)
    }

    async fn list_jobs(&self, filter: JobListFilter) -> Result<Vec<SyncJob>, RepositoryError> {
        let limit = if filter.limit > 0 { filter.limit } else { 50 };
        match (filter.status, filter.config_id) {
            (Some(status), Some(config_id)) => sqlx::query_as::<_, SyncJob>(
                "SELECT * FROM sync_jobs WHERE status = ? AND config_id = ? ORDER BY created_at DESC LIMIT ? OFFSET ?",
            )
            .bind(status)
            .bind(config_id)
            .bind(limit)
            .bind(filter.offset)
            .fetch_all(&self.pool)
            .await
            .map_err(RepositoryError::from_sqlx),
            (Some(status), None) => sqlx::query_as::<_, SyncJob>(
                "SELECT * FROM sync_jobs WHERE status = ? ORDER BY created_at DESC LIMIT ? OFFSET ?",
            )
            .bind(status)
            .bind(limit)
            .bind(filter.offset)
            .fetch_all(&self.pool)
            .await
            .map_err(RepositoryError::from_sqlx),
            (None, Some(config_id)) => sqlx::query_as::<_, SyncJob>(
                "SELECT * FROM sync_jobs WHERE config_id = ? ORDER BY created_at DESC LIMIT ? OFFSET ?",
            )
            .bind(config_id)
            .bind(limit)
            .bind(filter.offset)
            .fetch_all(&self.pool)
            .await
            .map_err(RepositoryError::from_sqlx),
            (None, None) => sqlx::query_as::<_, SyncJob>(
                "SELECT * FROM sync_jobs ORDER BY created_at DESC LIMIT ? OFFSET ?",
            )
            .bind(limit)
            .bind(filter.offset)
            .fetch_all(&self.pool)
            .await
            .map_err(RepositoryError::from_sqlx),
        }
    }

    async fn delete_terminal_jobs_before(
        &self,
        older_than: chrono::DateTime<chrono::Utc>,
    ) -> Result<u64, RepositoryError> {
        // `sync_logs` carries `ON DELETE CASCADE` on `job_id`, so removing the
        // job row is enough.
        let result = sqlx::query(
            r#"
            DELETE FROM sync_jobs
            WHERE end_time IS NOT NULL AND end_time < ?
              AND status IN (?, ?, ?)
            "#,
        )
        .bind(older_than)
        .bind(JobStatus::Completed)
        .bind(JobStatus::Failed)
        .bind(JobStatus::Cancelled)
        .execute(&self.pool)
        .await
        .map_err(RepositoryError::from_sqlx)?;
        Ok(result.rows_affected())
    }

    async fn append_log(&self, log: SyncLog) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO sync_logs (job_id, table_name, level, message, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(log.job_id)
        .bind(&log.table_name)
        .bind(log.level)
        .bind(&log.message)
        .bind(log.created_at)
        .execute(&self.pool)
        .await
        .map_err(RepositoryError::from_sqlx)?;
        Ok(())
    }

    async fn list_logs(&self, job_id: Uuid, filter: LogListFilter) -> Result<Vec<SyncLog>, RepositoryError> {
        let limit = if filter.limit > 0 { filter.limit } else { 200 };
        match filter.level {
            Some(level) => sqlx::query_as::<_, SyncLog>(
                "SELECT * FROM sync_logs WHERE job_id = ? AND level = ? ORDER BY created_at ASC LIMIT ?",
            )
            .bind(job_id)
            .bind(level)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(RepositoryError::from_sqlx),
            None => sqlx::query_as::<_, SyncLog>(
                "SELECT * FROM sync_logs WHERE job_id = ? ORDER BY created_at ASC LIMIT ?",
            )
            .bind(job_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(RepositoryError::from_sqlx),
        }
    }

    async fn get_checkpoint(&self, table_mapping_id: Uuid) -> Result<Option<SyncCheckpoint>, RepositoryError> {
        sqlx::query_as::<_, SyncCheckpoint>("SELECT * FROM sync_checkpoints WHERE table_mapping_id = ?")
            .bind(table_mapping_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(RepositoryError::from_sqlx)
    }

    async fn upsert_checkpoint(
        &self,
        table_mapping_id: Uuid,
        last_sync_value: Option<String>,
        checkpoint_data: Option<serde_json::Value>,
    ) -> Result<SyncCheckpoint, RepositoryError> {
        let id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO sync_checkpoints (id, table_mapping_id, last_sync_time, last_sync_value, checkpoint_data, created_at, updated_at)
            VALUES (?, ?, NOW(), ?, ?, NOW(), NOW())
            ON DUPLICATE KEY UPDATE
                last_sync_time = NOW(),
                last_sync_value = VALUES(last_sync_value),
                checkpoint_data = VALUES(checkpoint_data),
                updated_at = NOW()
            "#,
        )
        .bind(id)
        .bind(table_mapping_id)
        .bind(&last_sync_value)
        .bind(checkpoint_data.map(sqlx::types::Json))
        .execute(&self.pool)
        .await
        .map_err(RepositoryError::from_sqlx)?;

        self.get_checkpoint(table_mapping_id)
            .await?
            .ok_or(RepositoryError::NotFound)
    }
}
