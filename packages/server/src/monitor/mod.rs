//! In-memory map of active jobs and their per-table progress; single source
//! of truth for "is this job still running in this process?". Durable
//! state is advisory; this is authoritative.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::error;
use uuid::Uuid;

use crate::repository::Repository;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TableState {
    Pending,
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct TableProgress {
    pub name: String,
    pub state: TableState,
    pub rows_expected: i64,
    pub rows_processed: i64,
    pub last_error: Option<String>,
}

impl TableProgress {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: TableState::Pending,
            rows_expected: 0,
            rows_processed: 0,
            last_error: None,
        }
    }
}

/// One job's live progress record. The `cancel` token is the only thing a
/// worker needs to observe cooperative cancellation.
pub struct JobMonitorEntry {
    pub job_id: Uuid,
    pub config_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub total_tables: i32,
    pub completed_tables: i32,
    pub total_rows: i64,
    pub processed_rows: i64,
    pub tables: HashMap<String, TableProgress>,
    pub first_error: Option<String>,
    pub cancel: CancellationToken,
}

/// JSON-serializable snapshot returned by `GetActiveJobs` / the `/active`
/// endpoint. Always carries `config_id` so callers can resolve names without
/// a second lookup.
#[derive(Debug, Clone, Serialize)]
pub struct JobSnapshot {
    pub job_id: Uuid,
    pub config_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub total_tables: i32,
    pub completed_tables: i32,
    pub total_rows: i64,
    pub processed_rows: i64,
    pub tables: Vec<TableProgress>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Statistics {
    pub active_jobs: usize,
    pub total_rows_in_flight: i64,
    pub total_processed_in_flight: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    #[error("job {0} is already being monitored")]
    AlreadyMonitoring(Uuid),
    #[error("job {0} is not being monitored")]
    NotMonitoring(Uuid),
}

struct StatsCache {
    value: Statistics,
    computed_at: Instant,
}

const STATS_TTL: Duration = Duration::from_secs(2);

/// Tracks jobs this process is actively executing. Internals are a single
/// mutex guarding a `HashMap`; critical sections are kept short and never
/// held across Repository or network calls.
pub struct Monitor {
    entries: Mutex<HashMap<Uuid, JobMonitorEntry>>,
    stats_cache: Mutex<Option<StatsCache>>,
}

impl Default for Monitor {
    fn default() -> Self {
        Self::new()
    }
}

impl Monitor {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            stats_cache: Mutex::new(None),
        }
    }

    /// Loads `config_id` from the Repository and installs a fresh entry;
    /// fails if an entry already exists for this job id.
    pub async fn start_job_monitoring(
        &self,
        repository: &dyn Repository,
        job_id: Uuid,
        total_tables: i32,
    ) -> Result<CancellationToken, MonitorError> {
        let job = repository
            .get_job(job_id)
            .await
            .map_err(|_| MonitorError::NotMonitoring(job_id))?;

        let mut entries = self.entries.lock().unwrap();
        if entries.contains_key(&job_id) {
            return Err(MonitorError::AlreadyMonitoring(job_id));
        }
        let cancel = CancellationToken::new();
        entries.insert(
            job_id,
            JobMonitorEntry {
                job_id,
                config_id: job.config_id,
                start_time: Utc::now(),
                total_tables,
                completed_tables: 0,
                total_rows: 0,
                processed_rows: 0,
                tables: HashMap::new(),
                first_error: None,
                cancel: cancel.clone(),
            },
        );
        Ok(cancel)
    }

    /// Merges progress for one table into the job's totals. Idempotent on
    /// repeated zero-deltas.
    pub fn update_table_progress(
        &self,
        job_id: Uuid,
        table: &str,
        state: TableState,
        rows_expected_delta: i64,
        rows_processed_delta: i64,
        error: Option<String>,
    ) -> Result<(), MonitorError> {
        let mut entries = self.entries.lock().unwrap();
        let entry = entries
            .get_mut(&job_id)
            .ok_or(MonitorError::NotMonitoring(job_id))?;

        let progress = entry
            .tables
            .entry(table.to_string())
            .or_insert_with(|| TableProgress::new(table));

        let was_completed = progress.state == TableState::Completed;
        progress.state = state;
        progress.rows_expected += rows_expected_delta;
        progress.rows_processed += rows_processed_delta;
        if let Some(err) = error.clone() {
            progress.last_error = Some(err);
        }

        entry.total_rows += rows_expected_delta;
        entry.processed_rows += rows_processed_delta;
        if state == TableState::Completed && !was_completed {
            entry.completed_tables += 1;
        }
        if state == TableState::Failed && entry.first_error.is_none() {
            entry.first_error = error;
        }
        Ok(())
    }

    /// Unconditionally removes the in-memory entry, regardless of whether
    /// `repository.update_job` succeeds. This avoids the zombie-job class
    /// of bugs — the Repository write is best-effort and logged, never
    /// propagated.
    pub async fn finish_job_monitoring(
        &self,
        repository: &dyn Repository,
        job_id: Uuid,
        mut job: crate::models::SyncJob,
    ) {
        let guard = RemoveOnDrop {
            monitor: self,
            job_id,
        };

        job.end_time = Some(Utc::now());
        if let Err(err) = repository.update_job(job).await {
            error!(job_id = %job_id, error = %err, "durable job update failed during finish; Monitor entry still removed");
        }

        drop(guard);
        *self.stats_cache.lock().unwrap() = None;
    }

    pub fn get_active_jobs(&self) -> Vec<JobSnapshot> {
        self.entries
            .lock()
            .unwrap()
            .values()
            .map(|e| JobSnapshot {
                job_id: e.job_id,
                config_id: e.config_id,
                start_time: e.start_time,
                total_tables: e.total_tables,
                completed_tables: e.completed_tables,
                total_rows: e.total_rows,
                processed_rows: e.processed_rows,
                tables: e.tables.values().cloned().collect(),
            })
            .collect()
    }

    pub fn is_active(&self, job_id: Uuid) -> bool {
        self.entries.lock().unwrap().contains_key(&job_id)
    }

    pub fn cancel(&self, job_id: Uuid) -> Result<(), MonitorError> {
        let entries = self.entries.lock().unwrap();
        let entry = entries.get(&job_id).ok_or(MonitorError::NotMonitoring(job_id))?;
        entry.cancel.cancel();
        Ok(())
    }

    pub fn statistics(&self) -> Statistics {
        if let Some(cached) = self.stats_cache.lock().unwrap().as_ref() {
            if cached.computed_at.elapsed() < STATS_TTL {
                return cached.value.clone();
            }
        }
        let entries = self.entries.lock().unwrap();
        let stats = Statistics {
            active_jobs: entries.len(),
            total_rows_in_flight: entries.values().map(|e| e.total_rows).sum(),
            total_processed_in_flight: entries.values().map(|e| e.processed_rows).sum(),
        };
        *self.stats_cache.lock().unwrap() = Some(StatsCache {
            value: stats.clone(),
            computed_at: Instant::now(),
        });
        stats
    }
}

/// Scope guard that removes a Monitor entry on drop, regardless of which
/// code path leaves the enclosing function — panic, early return, or the
/// happy path. This is what makes `finish_job_monitoring` unconditional.
struct RemoveOnDrop<'a> {
    monitor: &'a Monitor,
    job_id: Uuid,
}

impl Drop for RemoveOnDrop<'_> {
    fn drop(&mut self) {
        self.monitor.entries.lock().unwrap().remove(&self.job_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SyncJob;
    use crate::repository::InMemoryRepository;

    #[tokio::test]
    async fn finish_removes_entry_even_when_repository_update_fails() {
        let repo = InMemoryRepository::new();
        let monitor = Monitor::new();
        let job_id = Uuid::new_v4();

        // No job row exists in the repository: `update_job` will return
        // `NotFound`, mirroring a row pruned out from under a running job.
        let job = SyncJob::builder().id(job_id).config_id(Uuid::new_v4()).build();

        // Install an entry directly (bypassing `start_job_monitoring`, which
        // requires a persisted row) to exercise cleanup in isolation.
        monitor.entries.lock().unwrap().insert(
            job_id,
            JobMonitorEntry {
                job_id,
                config_id: job.config_id,
                start_time: Utc::now(),
                total_tables: 1,
                completed_tables: 0,
                total_rows: 0,
                processed_rows: 0,
                tables: HashMap::new(),
                first_error: None,
                cancel: CancellationToken::new(),
            },
        );

        assert!(monitor.is_active(job_id));
        monitor.finish_job_monitoring(&repo, job_id, job).await;
        assert!(!monitor.is_active(job_id));
    }

    #[test]
    fn update_table_progress_is_idempotent_on_zero_deltas() {
        let monitor = Monitor::new();
        let job_id = Uuid::new_v4();
        monitor.entries.lock().unwrap().insert(
            job_id,
            JobMonitorEntry {
                job_id,
                config_id: Uuid::new_v4(),
                start_time: Utc::now(),
                total_tables: 1,
                completed_tables: 0,
                total_rows: 10,
                processed_rows: 5,
                tables: HashMap::new(),
                first_error: None,
                cancel: CancellationToken::new(),
            },
        );
        monitor
            .update_table_progress(job_id, "users", TableState::Running, 0, 0, None)
            .unwrap();
        let snapshot = monitor.get_active_jobs().into_iter().next().unwrap();
        assert_eq!(snapshot.total_rows, 10);
        assert_eq!(snapshot.processed_rows, 5);
    }

    #[test]
    fn cancel_unknown_job_errors() {
        let monitor = Monitor::new();
        assert!(monitor.cancel(Uuid::new_v4()).is_err());
    }
}
