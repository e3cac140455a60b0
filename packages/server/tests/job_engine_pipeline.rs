//! Exercises the full submit → dispatch → worker → terminal-state pipeline
//! without a live MySQL server. The registered remote points at a port
//! nothing listens on, so the table sync itself fails fast — this test is
//! about the plumbing around it: the job still reaches a terminal status,
//! logs get written, and the Monitor entry is cleaned up unconditionally
//! (`spec.md` §4.5, §8).

use std::sync::Arc;
use std::time::Duration;

use sqlx::mysql::MySqlPoolOptions;
use uuid::Uuid;

use sync_core::config::Config;
use sync_core::connection_manager::ConnectionManager;
use sync_core::job_engine::JobEngine;
use sync_core::models::{Connection, JobStatus, SyncConfig, SyncJob, TableMapping};
use sync_core::monitor::Monitor;
use sync_core::repository::{InMemoryRepository, Repository};
use sync_core::sync_engine::SyncEngine;

fn unreachable_pool() -> sqlx::MySqlPool {
    // Port 1 is privileged and unassigned; nothing binds it in any sandbox,
    // so connection attempts fail immediately with "connection refused"
    // rather than timing out.
    MySqlPoolOptions::new()
        .connect_lazy("mysql://root@127.0.0.1:1/control?charset=utf8mb4")
        .expect("lazy pool construction never touches the network")
}

#[tokio::test]
async fn job_reaches_failed_status_and_monitor_cleans_up() {
    let repository: Arc<dyn Repository> = Arc::new(InMemoryRepository::new());
    let connection_manager = Arc::new(ConnectionManager::new(unreachable_pool(), 1));
    let monitor = Arc::new(Monitor::new());
    let sync_engine = Arc::new(SyncEngine::new());
    let mut config = Config::default();
    config.sync_max_concurrency = 1;
    let config = Arc::new(config);

    let job_engine = Arc::new(JobEngine::new(
        Arc::clone(&repository),
        Arc::clone(&connection_manager),
        Arc::clone(&monitor),
        Arc::clone(&sync_engine),
        Arc::clone(&config),
    ));

    let connection = Connection::builder()
        .name("unreachable")
        .host("127.0.0.1")
        .port(1u16)
        .user("root")
        .encrypted_password("")
        .source_database("src_app")
        .local_db_name("local_app")
        .build();
    repository.create_connection(connection.clone()).await.unwrap();

    let sync_config = SyncConfig::builder()
        .connection_id(connection.id)
        .name("nightly")
        .source_db("src_app")
        .target_db("local_app")
        .build();
    repository.create_sync_config(sync_config.clone()).await.unwrap();

    let mapping = TableMapping::builder()
        .config_id(sync_config.id)
        .source_table("users")
        .target_table("users")
        .build();
    repository.create_table_mapping(mapping).await.unwrap();

    let job = SyncJob::builder().config_id(sync_config.id).build();
    repository.create_job(job.clone()).await.unwrap();

    job_engine.start().await;
    job_engine.submit(job.id).await.unwrap();

    let mut final_job = repository.get_job(job.id).await.unwrap();
    for _ in 0..50 {
        if final_job.status.is_terminal() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
        final_job = repository.get_job(job.id).await.unwrap();
    }

    assert_eq!(final_job.status, JobStatus::Failed);
    assert!(final_job.error_message.is_some());
    assert!(!monitor.is_active(job.id));

    let logs = repository
        .list_logs(job.id, Default::default())
        .await
        .unwrap();
    assert!(!logs.is_empty());
}

#[tokio::test]
async fn submit_without_start_is_rejected() {
    let repository: Arc<dyn Repository> = Arc::new(InMemoryRepository::new());
    let connection_manager = Arc::new(ConnectionManager::new(unreachable_pool(), 1));
    let monitor = Arc::new(Monitor::new());
    let sync_engine = Arc::new(SyncEngine::new());
    let config = Arc::new(Config::default());

    let job_engine = JobEngine::new(repository, connection_manager, monitor, sync_engine, config);

    assert!(job_engine.submit(Uuid::new_v4()).await.is_err());
}
