//! Bounded queue, fixed-size worker pool, dispatcher, and pending-job
//! resumer; composes Repository + Connection Manager + Monitor + Sync
//! Engine.

mod worker;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::connection_manager::ConnectionManager;
use crate::models::JobStatus;
use crate::monitor::Monitor;
use crate::repository::Repository;
use crate::sync_engine::SyncEngine;

#[derive(Debug, thiserror::Error)]
pub enum JobEngineError {
    #[error("job engine has not been started")]
    NotStarted,
    #[error("job queue is full")]
    QueueFull,
    #[error("job {0} not found")]
    NotFound(Uuid),
}

/// Queueing, worker pool, and pending-job resumption over the core
/// components. One instance is constructed per process.
pub struct JobEngine {
    repository: Arc<dyn Repository>,
    connection_manager: Arc<ConnectionManager>,
    monitor: Arc<Monitor>,
    sync_engine: Arc<SyncEngine>,
    config: Arc<Config>,
    sender: mpsc::Sender<Uuid>,
    receiver: tokio::sync::Mutex<Option<mpsc::Receiver<Uuid>>>,
    started: AtomicBool,
    worker_handles: tokio::sync::Mutex<Vec<JoinHandle<()>>>,
}

const QUEUE_CAPACITY: usize = 256;

impl JobEngine {
    pub fn new(
        repository: Arc<dyn Repository>,
        connection_manager: Arc<ConnectionManager>,
        monitor: Arc<Monitor>,
        sync_engine: Arc<SyncEngine>,
        config: Arc<Config>,
    ) -> Self {
        let (sender, receiver) = mpsc::channel(QUEUE_CAPACITY);
        Self {
            repository,
            connection_manager,
            monitor,
            sync_engine,
            config,
            sender,
            receiver: tokio::sync::Mutex::new(Some(receiver)),
            started: AtomicBool::new(false),
            worker_handles: tokio::sync::Mutex::new(Vec::new()),
        }
    }

    /// Idempotent on a second call: spawns the worker pool and dispatcher,
    /// and schedules pending-job resumption asynchronously so it never
    /// blocks `start`.
    pub async fn start(self: &Arc<Self>) {
        if self.started.swap(true, Ordering::SeqCst) {
            return;
        }

        let receiver = self
            .receiver
            .lock()
            .await
            .take()
            .expect("receiver taken exactly once across the engine's lifetime");

        let worker_count = self.config.sync_max_concurrency.max(1);
        let shared_receiver = Arc::new(tokio::sync::Mutex::new(receiver));

        let mut handles = Vec::with_capacity(worker_count);
        for worker_id in 0..worker_count {
            let engine = Arc::clone(self);
            let receiver = Arc::clone(&shared_receiver);
            handles.push(tokio::spawn(async move {
                worker::run(worker_id, engine, receiver).await;
            }));
        }
        *self.worker_handles.lock().await = handles;

        let engine = Arc::clone(self);
        tokio::spawn(async move {
            engine.resume_pending_jobs().await;
        });

        let engine = Arc::clone(self);
        tokio::spawn(async move {
            engine.run_cleanup_loop().await;
        });

        info!(workers = worker_count, "job engine started");
    }

    /// Periodically prunes terminal jobs (and their logs) older than
    /// `sync_cleanup_age_secs`, on the same interval as the cutoff itself.
    async fn run_cleanup_loop(self: Arc<Self>) {
        let cleanup_age = self.config.cleanup_age();
        if cleanup_age.is_zero() {
            return;
        }
        let mut ticker = tokio::time::interval(cleanup_age);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if !self.started.load(Ordering::SeqCst) {
                return;
            }
            let cutoff = Utc::now() - chrono::Duration::from_std(cleanup_age).unwrap_or_default();
            match self.repository.delete_terminal_jobs_before(cutoff).await {
                Ok(removed) if removed > 0 => {
                    info!(removed, "pruned stale terminal jobs past cleanup age")
                }
                Ok(_) => {}
                Err(err) => warn!(error = %err, "failed to prune stale terminal jobs"),
            }
        }
    }

    /// Queries all `pending` jobs; resubmits those within the resumption
    /// window, fails the rest with "resumption window exceeded".
    async fn resume_pending_jobs(&self) {
        let pending = match self.repository.list_pending_jobs().await {
            Ok(jobs) => jobs,
            Err(err) => {
                warn!(error = %err, "failed to list pending jobs for resumption");
                return;
            }
        };

        for mut job in pending {
            if job.is_ready_to_resume(self.config.resumption_window_hours) {
                if let Err(err) = self.submit(job.id).await {
                    warn!(job_id = %job.id, error = %err, "failed to resubmit pending job");
                }
            } else {
                job.status = JobStatus::Failed;
                job.end_time = Some(Utc::now());
                job.error_message = Some("resumption window exceeded".to_string());
                if let Err(err) = self.repository.update_job(job).await {
                    warn!(error = %err, "failed to fail stale pending job");
                }
            }
        }
    }

    /// Enqueues a job id; fails if the engine has not been started or the
    /// queue is full.
    pub async fn submit(&self, job_id: Uuid) -> Result<(), JobEngineError> {
        if !self.started.load(Ordering::SeqCst) {
            return Err(JobEngineError::NotStarted);
        }
        self.sender.try_send(job_id).map_err(|_| JobEngineError::QueueFull)
    }

    /// Trips the Monitor's cancellation signal for an active job; workers
    /// honor it at the next page boundary.
    pub fn cancel(&self, job_id: Uuid) -> Result<(), JobEngineError> {
        self.monitor.cancel(job_id).map_err(|_| JobEngineError::NotFound(job_id))
    }

    /// Stops accepting new work and waits for in-flight workers up to
    /// `timeout`. Jobs still running when the deadline expires are left
    /// `running` durably; the next process's resumption scan does not touch
    /// them (only `pending` is resumed).
    pub async fn stop(&self, timeout: Duration) {
        self.started.store(false, Ordering::SeqCst);
        let handles = std::mem::take(&mut *self.worker_handles.lock().await);
        let join_all = futures::future::join_all(handles);
        if tokio::time::timeout(timeout, join_all).await.is_err() {
            warn!("job engine stop timed out with workers still in flight");
        }
    }

    pub fn repository(&self) -> &Arc<dyn Repository> {
        &self.repository
    }

    pub fn connection_manager(&self) -> &Arc<ConnectionManager> {
        &self.connection_manager
    }

    pub fn monitor(&self) -> &Arc<Monitor> {
        &self.monitor
    }

    pub fn config(&self) -> &Arc<Config> {
        &self.config
    }
}
