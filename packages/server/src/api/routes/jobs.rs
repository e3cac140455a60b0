use axum::extract::{Extension, Path, Query};
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::envelope::Envelope;
use crate::api::AppState;
use crate::error::{AppError, AppResult};
use crate::models::{JobStatus, LogLevel, SyncJob, SyncLog};
use crate::monitor::JobSnapshot;
use crate::repository::{JobListFilter, LogListFilter};

#[derive(Debug, Deserialize)]
pub struct ListJobsQuery {
    pub status: Option<JobStatus>,
    pub config_id: Option<Uuid>,
    #[serde(default)]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

#[derive(Debug, Deserialize)]
pub struct SubmitJobRequest {
    pub config_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct SubmitJobResponse {
    pub id: Uuid,
    pub status: JobStatus,
}

#[derive(Debug, Deserialize)]
pub struct ListLogsQuery {
    pub level: Option<LogLevel>,
    #[serde(default)]
    pub limit: i64,
}

pub async fn list(
    Extension(state): Extension<AppState>,
    Query(query): Query<ListJobsQuery>,
) -> AppResult<Envelope<Vec<SyncJob>>> {
    let jobs = state
        .repository
        .list_jobs(JobListFilter {
            status: query.status,
            config_id: query.config_id,
            limit: query.limit,
            offset: query.offset,
        })
        .await?;
    Ok(Envelope::ok(jobs))
}

pub async fn get(
    Extension(state): Extension<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Envelope<SyncJob>> {
    let job = state.repository.get_job(id).await?;
    Ok(Envelope::ok(job))
}

/// Rejects submissions against a config with zero enabled table mappings
/// at submission time.
pub async fn submit(
    Extension(state): Extension<AppState>,
    Json(body): Json<SubmitJobRequest>,
) -> AppResult<Envelope<SubmitJobResponse>> {
    let config = state.repository.get_sync_config(body.config_id).await?;
    let mappings = state.repository.list_enabled_table_mappings(config.id).await?;
    if mappings.is_empty() {
        return Err(AppError::Validation(
            "sync config has no enabled table mappings".into(),
        ));
    }

    let job = SyncJob::builder().config_id(config.id).build();
    let created = state.repository.create_job(job).await?;
    state.job_engine.submit(created.id).await?;

    Ok(Envelope::ok(SubmitJobResponse {
        id: created.id,
        status: created.status,
    }))
}

pub async fn stop(
    Extension(state): Extension<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Envelope<()>> {
    state.job_engine.cancel(id)?;
    Ok(Envelope::ok(()))
}

pub async fn logs(
    Extension(state): Extension<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<ListLogsQuery>,
) -> AppResult<Envelope<Vec<SyncLog>>> {
    let logs = state
        .repository
        .list_logs(
            id,
            LogListFilter {
                level: query.level,
                limit: query.limit,
            },
        )
        .await?;
    Ok(Envelope::ok(logs))
}

pub async fn active(Extension(state): Extension<AppState>) -> Envelope<Vec<JobSnapshot>> {
    Envelope::ok(state.monitor.get_active_jobs())
}

pub async fn history(
    Extension(state): Extension<AppState>,
    Query(query): Query<ListJobsQuery>,
) -> AppResult<Envelope<Vec<SyncJob>>> {
    let filter = JobListFilter {
        status: None,
        config_id: query.config_id,
        limit: if query.limit > 0 { query.limit } else { 100 },
        offset: query.offset,
    };
    let jobs = state.repository.list_jobs(filter).await?;
    Ok(Envelope::ok(jobs.into_iter().filter(|j| j.status.is_terminal()).collect()))
}
