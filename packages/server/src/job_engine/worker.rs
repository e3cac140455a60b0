//! One worker task: claims job ids from the shared queue and drives them to
//! a terminal state.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use chrono::Utc;
use futures::FutureExt;
use tokio::sync::{mpsc, Mutex};
use tracing::{error, info};
use uuid::Uuid;

use crate::models::{JobStatus, LogLevel, SyncLog};
use crate::monitor::TableState;
use crate::sync_engine::TableSyncContext;

use super::JobEngine;

pub async fn run(worker_id: usize, engine: Arc<JobEngine>, receiver: Arc<Mutex<mpsc::Receiver<Uuid>>>) {
    loop {
        let job_id = {
            let mut rx = receiver.lock().await;
            match rx.recv().await {
                Some(id) => id,
                None => break,
            }
        };

        let job_timeout = engine.config().job_timeout();
        let guarded = AssertUnwindSafe(process_job(Arc::clone(&engine), job_id)).catch_unwind();

        match tokio::time::timeout(job_timeout, guarded).await {
            Ok(Ok(())) => {}
            Ok(Err(panic)) => {
                error!(worker_id, job_id = %job_id, ?panic, "worker panicked processing job; marking it failed");
                recover_from_panic(&engine, job_id).await;
            }
            Err(_) => {
                error!(worker_id, job_id = %job_id, timeout_secs = job_timeout.as_secs(), "job exceeded configured timeout; marking it failed");
                recover_from_timeout(&engine, job_id).await;
            }
        }
    }
}

/// A worker that panics mid-job must still reach a terminal state and call
/// `finish_job_monitoring` exactly once.
async fn recover_from_panic(engine: &Arc<JobEngine>, job_id: Uuid) {
    if let Ok(mut job) = engine.repository().get_job(job_id).await {
        job.status = JobStatus::Failed;
        job.error_message = Some("worker panicked".to_string());
        engine.monitor().finish_job_monitoring(engine.repository().as_ref(), job_id, job).await;
    }
}

/// Dropping the timed-out future is safe: any transaction in flight rolls
/// back on drop, and the Monitor entry is still removed here so a timed-out
/// job never lingers as a zombie.
async fn recover_from_timeout(engine: &Arc<JobEngine>, job_id: Uuid) {
    if let Ok(mut job) = engine.repository().get_job(job_id).await {
        job.status = JobStatus::Failed;
        job.error_message = Some("job exceeded configured timeout".to_string());
        engine.monitor().finish_job_monitoring(engine.repository().as_ref(), job_id, job).await;
    }
}

async fn process_job(engine: Arc<JobEngine>, job_id: Uuid) {
    let repository = engine.repository().clone();

    let mut job = match repository.get_job(job_id).await {
        Ok(job) => job,
        Err(err) => {
            error!(job_id = %job_id, error = %err, "job vanished before worker could claim it");
            return;
        }
    };

    let config = match repository.get_sync_config(job.config_id).await {
        Ok(config) => config,
        Err(err) => {
            job.status = JobStatus::Failed;
            job.error_message = Some(format!("sync config missing: {err}"));
            engine.monitor().finish_job_monitoring(repository.as_ref(), job_id, job).await;
            return;
        }
    };

    let mappings = match repository.list_enabled_table_mappings(config.id).await {
        Ok(m) if !m.is_empty() => m,
        Ok(_) => {
            job.status = JobStatus::Failed;
            job.error_message = Some("no enabled table mappings".to_string());
            engine.monitor().finish_job_monitoring(repository.as_ref(), job_id, job).await;
            return;
        }
        Err(err) => {
            job.status = JobStatus::Failed;
            job.error_message = Some(format!("failed to load table mappings: {err}"));
            engine.monitor().finish_job_monitoring(repository.as_ref(), job_id, job).await;
            return;
        }
    };

    let connection = match repository.get_connection(config.connection_id).await {
        Ok(c) => c,
        Err(err) => {
            job.status = JobStatus::Failed;
            job.error_message = Some(format!("connection missing: {err}"));
            engine.monitor().finish_job_monitoring(repository.as_ref(), job_id, job).await;
            return;
        }
    };

    job.total_tables = mappings.len() as i32;
    let cancel = match engine
        .monitor()
        .start_job_monitoring(repository.as_ref(), job_id, job.total_tables)
        .await
    {
        Ok(token) => token,
        Err(err) => {
            error!(job_id = %job_id, error = %err, "failed to start job monitoring");
            return;
        }
    };

    job.status = JobStatus::Running;
    job.start_time = Some(Utc::now());
    if let Err(err) = repository.update_job(job.clone()).await {
        error!(job_id = %job_id, error = %err, "failed to persist running transition");
    }

    let source_pool = match engine.connection_manager().get_remote_pool(&connection).await {
        Ok(pool) => pool,
        Err(err) => {
            job.status = JobStatus::Failed;
            job.error_message = Some(format!("remote connection unavailable: {err}"));
            engine.monitor().finish_job_monitoring(repository.as_ref(), job_id, job).await;
            return;
        }
    };
    let target_pool = engine.connection_manager().local_pool().clone();

    let mut any_failed = false;
    let fail_fast = config.options().fail_fast;

    for mapping in &mappings {
        if cancel.is_cancelled() {
            break;
        }

        let ctx = TableSyncContext {
            source_pool: &source_pool,
            source_database: &connection.source_database,
            target_pool: &target_pool,
            target_database: &connection.local_db_name,
            mapping,
            effective_mode: mapping.effective_mode(config.default_sync_mode),
            batch_size: config.options().batch_size,
            conflict_resolution: config.options().conflict_resolution,
            retry_attempts: config.options().retry_attempts,
            retry_delay: std::time::Duration::from_millis(config.options().retry_delay_ms),
            cancel: &cancel,
        };

        let monitor = engine.monitor();
        let table_name = mapping.source_table.clone();
        let on_progress = |delta: i64| {
            let _ = monitor.update_table_progress(
                job_id,
                &table_name,
                TableState::Running,
                0,
                delta,
                None,
            );
        };

        match engine.sync_engine.sync_table(repository.as_ref(), &ctx, &on_progress).await {
            Ok(outcome) => {
                job.processed_rows += outcome.rows_processed;
                job.completed_tables += 1;
                let _ = monitor.update_table_progress(
                    job_id,
                    &mapping.source_table,
                    TableState::Completed,
                    0,
                    0,
                    None,
                );
                let _ = repository
                    .append_log(SyncLog::new(
                        job_id,
                        Some(mapping.source_table.clone()),
                        LogLevel::Info,
                        format!("synced {} rows", outcome.rows_processed),
                    ))
                    .await;
                if outcome.degraded_to_full {
                    let _ = repository
                        .append_log(SyncLog::new(
                            job_id,
                            Some(mapping.source_table.clone()),
                            LogLevel::Warn,
                            "watermark column missing; degraded to full sync".to_string(),
                        ))
                        .await;
                }
            }
            Err(err) => {
                any_failed = true;
                let _ = monitor.update_table_progress(
                    job_id,
                    &mapping.source_table,
                    TableState::Failed,
                    0,
                    0,
                    Some(err.to_string()),
                );
                let _ = repository
                    .append_log(SyncLog::new(
                        job_id,
                        Some(mapping.source_table.clone()),
                        LogLevel::Error,
                        format!("table sync failed: {err}"),
                    ))
                    .await;
                if fail_fast {
                    break;
                }
            }
        }
    }

    job.status = if cancel.is_cancelled() {
        JobStatus::Cancelled
    } else if any_failed {
        JobStatus::Failed
    } else {
        JobStatus::Completed
    };
    if job.status == JobStatus::Failed && job.error_message.is_none() {
        job.error_message = Some("one or more tables failed".to_string());
    }

    info!(job_id = %job_id, status = ?job.status, completed_tables = job.completed_tables, total_tables = job.total_tables, "job finished");
    engine.monitor().finish_job_monitoring(repository.as_ref(), job_id, job).await;
}
