use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use crate::models::{
    Connection, SyncCheckpoint, SyncConfig, SyncJob, SyncLog, TableMapping,
};

use super::{JobListFilter, LogListFilter, Repository, RepositoryError};

/// In-memory test double mirroring [`super::mysql::MySqlRepository`]'s
/// contract, used by job/sync-engine tests so they don't need a live MySQL
/// instance.
#[derive(Default)]
pub struct InMemoryRepository {
    connections: Mutex<HashMap<Uuid, Connection>>,
    sync_configs: Mutex<HashMap<Uuid, SyncConfig>>,
    table_mappings: Mutex<HashMap<Uuid, TableMapping>>,
    jobs: Mutex<HashMap<Uuid, SyncJob>>,
    logs: Mutex<Vec<SyncLog>>,
    checkpoints: Mutex<HashMap<Uuid, SyncCheckpoint>>,
    next_log_id: AtomicI64,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mirrors the `ON DELETE CASCADE` chain from `sync_configs` down to
    /// `table_mappings`/`sync_checkpoints` and `sync_jobs`/`sync_logs`.
    fn cascade_delete_sync_config_children(&self, config_id: Uuid) {
        let mapping_ids: Vec<Uuid> = {
            let mut mappings = self.table_mappings.lock().unwrap();
            let ids: Vec<Uuid> = mappings
                .values()
                .filter(|m| m.config_id == config_id)
                .map(|m| m.id)
                .collect();
            mappings.retain(|_, m| m.config_id != config_id);
            ids
        };
        self.checkpoints
            .lock()
            .unwrap()
            .retain(|_, c| !mapping_ids.contains(&c.table_mapping_id));

        let job_ids: Vec<Uuid> = {
            let mut jobs = self.jobs.lock().unwrap();
            let ids: Vec<Uuid> = jobs
                .values()
                .filter(|j| j.config_id == config_id)
                .map(|j| j.id)
                .collect();
            jobs.retain(|_, j| j.config_id != config_id);
            ids
        };
        self.logs.lock().unwrap().retain(|l| !job_ids.contains(&l.job_id));
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn create_connection(&self, connection: Connection) -> Result<Connection, RepositoryError> {
        let mut map = self.connections.lock().unwrap();
        if map.values().any(|c| c.name == connection.name) {
            return Err(RepositoryError::Conflict(format!(
                "connection name '{}' already exists",
                connection.name
            )));
        }
        map.insert(connection.id, connection.clone());
        Ok(connection)
    }

    async fn get_connection(&self, id: Uuid) -> Result<Connection, RepositoryError> {
        self.connections
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or(RepositoryError::NotFound)
    }

    async fn list_connections(&self) -> Result<Vec<Connection>, RepositoryError> {
        Ok(self.connections.lock().unwrap().values().cloned().collect())
    }

    async fn update_connection(&self, connection: Connection) -> Result<Connection, RepositoryError> {
        let mut map = self.connections.lock().unwrap();
        if !map.contains_key(&connection.id) {
            return Err(RepositoryError::NotFound);
        }
        map.insert(connection.id, connection.clone());
        Ok(connection)
    }

    async fn delete_connection(&self, id: Uuid) -> Result<(), RepositoryError> {
        self.connections.lock().unwrap().remove(&id);
        let config_ids: Vec<Uuid> = {
            let mut configs = self.sync_configs.lock().unwrap();
            let ids: Vec<Uuid> = configs
                .values()
                .filter(|c| c.connection_id == id)
                .map(|c| c.id)
                .collect();
            configs.retain(|_, c| c.connection_id != id);
            ids
        };
        for config_id in config_ids {
            self.cascade_delete_sync_config_children(config_id);
        }
        Ok(())
    }

    async fn create_sync_config(&self, config: SyncConfig) -> Result<SyncConfig, RepositoryError> {
        let mut map = self.sync_configs.lock().unwrap();
        map.insert(config.id, config.clone());
        Ok(config)
    }

    async fn get_sync_config(&self, id: Uuid) -> Result<SyncConfig, RepositoryError> {
        self.sync_configs
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or(RepositoryError::NotFound)
    }

    async fn list_sync_configs(
        &self,
        connection_id: Option<Uuid>,
    ) -> Result<Vec<SyncConfig>, RepositoryError> {
        let map = self.sync_configs.lock().unwrap();
        Ok(map
            .values()
            .filter(|c| connection_id.is_none_or(|id| c.connection_id == id))
            .cloned()
            .collect())
    }

    async fn update_sync_config(&self, config: SyncConfig) -> Result<SyncConfig, RepositoryError> {
        let mut map = self.sync_configs.lock().unwrap();
        if !map.contains_key(&config.id) {
            return Err(RepositoryError::NotFound);
        }
        map.insert(config.id, config.clone());
        Ok(config)
    }

    async fn delete_sync_config(&self, id: Uuid) -> Result<(), RepositoryError> {
        self.sync_configs.lock().unwrap().remove(&id);
        self.cascade_delete_sync_config_children(id);
        Ok(())
    }

    async fn create_table_mapping(&self, mapping: TableMapping) -> Result<TableMapping, RepositoryError> {
        let mut map = self.table_mappings.lock().unwrap();
        map.insert(mapping.id, mapping.clone());
        Ok(mapping)
    }

    async fn get_table_mapping(&self, id: Uuid) -> Result<TableMapping, RepositoryError> {
        self.table_mappings
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or(RepositoryError::NotFound)
    }

    async fn list_enabled_table_mappings(
        &self,
        config_id: Uuid,
    ) -> Result<Vec<TableMapping>, RepositoryError> {
        let map = self.table_mappings.lock().unwrap();
        let mut mappings: Vec<TableMapping> = map
            .values()
            .filter(|m| m.config_id == config_id && m.enabled)
            .cloned()
            .collect();
        mappings.sort_by_key(|m| m.sort_order);
        Ok(mappings)
    }

    async fn list_table_mappings(&self, config_id: Uuid) -> Result<Vec<TableMapping>, RepositoryError> {
        let map = self.table_mappings.lock().unwrap();
        let mut mappings: Vec<TableMapping> = map
            .values()
            .filter(|m| m.config_id == config_id)
            .cloned()
            .collect();
        mappings.sort_by_key(|m| m.sort_order);
        Ok(mappings)
    }

    async fn update_table_mapping(&self, mapping: TableMapping) -> Result<TableMapping, RepositoryError> {
        let mut map = self.table_mappings.lock().unwrap();
        if !map.contains_key(&mapping.id) {
            return Err(RepositoryError::NotFound);
        }
        map.insert(mapping.id, mapping.clone());
        Ok(mapping)
    }

    async fn delete_table_mapping(&self, id: Uuid) -> Result<(), RepositoryError> {
        self.table_mappings.lock().unwrap().remove(&id);
        self.checkpoints.lock().unwrap().retain(|_, c| c.table_mapping_id != id);
        Ok(())
    }

    async fn create_job(&self, job: SyncJob) -> Result<SyncJob, RepositoryError> {
        let mut map = self.jobs.lock().unwrap();
        map.insert(job.id, job.clone());
        Ok(job)
    }

    async fn get_job(&self, id: Uuid) -> Result<SyncJob, RepositoryError> {
        self.jobs.lock().unwrap().get(&id).cloned().ok_or(RepositoryError::NotFound)
    }

    async fn update_job(&self, job: SyncJob) -> Result<SyncJob, RepositoryError> {
        let mut map = self.jobs.lock().unwrap();
        if !map.contains_key(&job.id) {
            return Err(RepositoryError::NotFound);
        }
        map.insert(job.id, job.clone());
        Ok(job)
    }

    async fn list_pending_jobs(&self) -> Result<Vec<SyncJob>, RepositoryError> {
        Ok(self
            .jobs
            .lock()
            .unwrap()
            .values()
            .filter(|j| j.status == crate::models::JobStatus::Pending)
            .cloned()
            .collect())
    }

    async fn list_jobs(&self, filter: JobListFilter) -> Result<Vec<SyncJob>, RepositoryError> {
        let map = self.jobs.lock().unwrap();
        let mut jobs: Vec<SyncJob> = map
            .values()
            .filter(|j| filter.status.is_none_or(|s| j.status == s))
            .filter(|j| filter.config_id.is_none_or(|id| j.config_id == id))
            .cloned()
            .collect();
        jobs.sort_by_key(|j| std::cmp::Reverse(j.created_at));
        let offset = filter.offset.max(0) as usize;
        let limit = if filter.limit > 0 { filter.limit as usize } else { 50 };
        Ok(jobs.into_iter().skip(offset).take(limit).collect())
    }

    async fn delete_terminal_jobs_before(
        &self,
        older_than: chrono::DateTime<chrono::Utc>,
    ) -> Result<u64, RepositoryError> {
        let removed_ids: Vec<Uuid> = {
            let mut jobs = self.jobs.lock().unwrap();
            let ids: Vec<Uuid> = jobs
                .values()
                .filter(|j| j.status.is_terminal() && j.end_time.is_some_and(|t| t < older_than))
                .map(|j| j.id)
                .collect();
            jobs.retain(|id, _| !ids.contains(id));
            ids
        };
        self.logs.lock().unwrap().retain(|l| !removed_ids.contains(&l.job_id));
        Ok(removed_ids.len() as u64)
    }

    async fn append_log(&self, mut log: SyncLog) -> Result<(), RepositoryError> {
        log.id = self.next_log_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.logs.lock().unwrap().push(log);
        Ok(())
    }

    async fn list_logs(&self, job_id: Uuid, filter: LogListFilter) -> Result<Vec<SyncLog>, RepositoryError> {
        let logs = self.logs.lock().unwrap();
        let limit = if filter.limit > 0 { filter.limit as usize } else { 200 };
        Ok(logs
            .iter()
            .filter(|l| l.job_id == job_id)
            .filter(|l| filter.level.is_none_or(|lvl| l.level == lvl))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn get_checkpoint(&self, table_mapping_id: Uuid) -> Result<Option<SyncCheckpoint>, RepositoryError> {
        Ok(self
            .checkpoints
            .lock()
            .unwrap()
            .values()
            .find(|c| c.table_mapping_id == table_mapping_id)
            .cloned())
    }

    async fn upsert_checkpoint(
        &self,
        table_mapping_id: Uuid,
        last_sync_value: Option<String>,
        checkpoint_data: Option<serde_json::Value>,
    ) -> Result<SyncCheckpoint, RepositoryError> {
        let mut map = self.checkpoints.lock().unwrap();
        let existing_id = map
            .values()
            .find(|c| c.table_mapping_id == table_mapping_id)
            .map(|c| c.id);

        let checkpoint = if let Some(id) = existing_id {
            let entry = map.get_mut(&id).unwrap();
            entry.last_sync_time = Some(chrono::Utc::now());
            entry.last_sync_value = last_sync_value;
            entry.checkpoint_data = checkpoint_data.map(sqlx::types::Json);
            entry.updated_at = chrono::Utc::now();
            entry.clone()
        } else {
            let checkpoint = SyncCheckpoint::builder()
                .table_mapping_id(table_mapping_id)
                .last_sync_time(chrono::Utc::now())
                .build();
            let mut checkpoint = checkpoint;
            checkpoint.last_sync_value = last_sync_value;
            checkpoint.checkpoint_data = checkpoint_data.map(sqlx::types::Json);
            map.insert(checkpoint.id, checkpoint.clone());
            checkpoint
        };
        Ok(checkpoint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Connection, SyncConfig, SyncMode};

    fn sample_connection() -> Connection {
        Connection::builder()
            .name("primary")
            .host("127.0.0.1")
            .port(3306u16)
            .user("root")
            .encrypted_password("")
            .source_database("app")
            .local_db_name("app_local")
            .build()
    }

    #[tokio::test]
    async fn duplicate_connection_name_is_a_conflict() {
        let repo = InMemoryRepository::new();
        repo.create_connection(sample_connection()).await.unwrap();
        let err = repo
            .create_connection(sample_connection())
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));
    }

    #[tokio::test]
    async fn checkpoint_upsert_advances_in_place() {
        let repo = InMemoryRepository::new();
        let mapping_id = Uuid::new_v4();
        let first = repo
            .upsert_checkpoint(mapping_id, Some("100".into()), None)
            .await
            .unwrap();
        let second = repo
            .upsert_checkpoint(mapping_id, Some("200".into()), None)
            .await
            .unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(second.last_sync_value.as_deref(), Some("200"));
    }

    #[tokio::test]
    async fn deleting_connection_cascades_to_configs() {
        let repo = InMemoryRepository::new();
        let conn = repo.create_connection(sample_connection()).await.unwrap();
        let config = SyncConfig::builder()
            .connection_id(conn.id)
            .name("nightly")
            .default_sync_mode(SyncMode::Full)
            .source_db("app")
            .target_db("app_local")
            .build();
        repo.create_sync_config(config.clone()).await.unwrap();

        repo.delete_connection(conn.id).await.unwrap();
        assert!(repo.get_sync_config(config.id).await.is_err());
    }

    #[tokio::test]
    async fn deleting_connection_cascades_transitively_to_mappings_checkpoints_jobs_and_logs() {
        let repo = InMemoryRepository::new();
        let conn = repo.create_connection(sample_connection()).await.unwrap();
        let config = SyncConfig::builder()
            .connection_id(conn.id)
            .name("nightly")
            .default_sync_mode(SyncMode::Full)
            .source_db("app")
            .target_db("app_local")
            .build();
        let config = repo.create_sync_config(config).await.unwrap();

        let mapping = TableMapping::builder()
            .config_id(config.id)
            .source_table("users")
            .target_table("users")
            .build();
        let mapping = repo.create_table_mapping(mapping).await.unwrap();
        repo.upsert_checkpoint(mapping.id, Some("10".into()), None).await.unwrap();

        let job = SyncJob::builder().config_id(config.id).build();
        let job = repo.create_job(job).await.unwrap();
        repo.append_log(SyncLog::new(job.id, None, crate::models::LogLevel::Info, "started".into()))
            .await
            .unwrap();

        repo.delete_connection(conn.id).await.unwrap();

        assert!(repo.get_table_mapping(mapping.id).await.is_err());
        assert!(repo.get_checkpoint(mapping.id).await.unwrap().is_none());
        assert!(repo.get_job(job.id).await.is_err());
        assert!(repo
            .list_logs(job.id, LogListFilter::default())
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn cleanup_removes_only_old_terminal_jobs() {
        let repo = InMemoryRepository::new();

        let mut old_completed = SyncJob::builder().config_id(Uuid::new_v4()).build();
        old_completed.status = crate::models::JobStatus::Completed;
        old_completed.end_time = Some(chrono::Utc::now() - chrono::Duration::days(40));
        let old_completed = repo.create_job(old_completed).await.unwrap();
        repo.append_log(SyncLog::new(old_completed.id, None, crate::models::LogLevel::Info, "done".into()))
            .await
            .unwrap();

        let mut recent_completed = SyncJob::builder().config_id(Uuid::new_v4()).build();
        recent_completed.status = crate::models::JobStatus::Completed;
        recent_completed.end_time = Some(chrono::Utc::now());
        let recent_completed = repo.create_job(recent_completed).await.unwrap();

        let running = SyncJob::builder().config_id(Uuid::new_v4()).build();
        let running = repo.create_job(running).await.unwrap();

        let cutoff = chrono::Utc::now() - chrono::Duration::days(30);
        let removed = repo.delete_terminal_jobs_before(cutoff).await.unwrap();

        assert_eq!(removed, 1);
        assert!(repo.get_job(old_completed.id).await.is_err());
        assert!(repo
            .list_logs(old_completed.id, LogListFilter::default())
            .await
            .unwrap()
            .is_empty());
        assert!(repo.get_job(recent_completed.id).await.is_ok());
        assert!(repo.get_job(running.id).await.is_ok());
    }
}
