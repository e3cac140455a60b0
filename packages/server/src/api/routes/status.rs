use axum::extract::{Extension, Query};
use serde::{Deserialize, Serialize};

use crate::api::envelope::Envelope;
use crate::api::AppState;
use crate::error::AppResult;
use crate::monitor::Statistics;

#[derive(Debug, Serialize)]
pub struct SyncStatus {
    pub enabled: bool,
    pub max_concurrency: usize,
    pub active_jobs: usize,
}

pub async fn status(Extension(state): Extension<AppState>) -> Envelope<SyncStatus> {
    Envelope::ok(SyncStatus {
        enabled: state.config.sync_enabled,
        max_concurrency: state.config.sync_max_concurrency,
        active_jobs: state.monitor.get_active_jobs().len(),
    })
}

#[derive(Debug, Deserialize)]
pub struct StatsQuery {
    #[serde(default = "default_period")]
    pub period: String,
}

fn default_period() -> String {
    "24h".to_string()
}

#[derive(Debug, Serialize)]
pub struct SyncStats {
    pub period: String,
    pub completed_jobs: i64,
    pub failed_jobs: i64,
    pub rows_synced: i64,
    pub live: Statistics,
}

fn period_hours(period: &str) -> i64 {
    match period {
        "1h" => 1,
        "7d" => 24 * 7,
        "30d" => 24 * 30,
        _ => 24,
    }
}

pub async fn stats(
    Extension(state): Extension<AppState>,
    Query(query): Query<StatsQuery>,
) -> AppResult<Envelope<SyncStats>> {
    let since = chrono::Utc::now() - chrono::Duration::hours(period_hours(&query.period));
    let jobs = state
        .repository
        .list_jobs(crate::repository::JobListFilter {
            status: None,
            config_id: None,
            limit: 10_000,
            offset: 0,
        })
        .await?;

    let in_window: Vec<_> = jobs.into_iter().filter(|j| j.created_at >= since).collect();
    let completed_jobs = in_window
        .iter()
        .filter(|j| j.status == crate::models::JobStatus::Completed)
        .count() as i64;
    let failed_jobs = in_window
        .iter()
        .filter(|j| j.status == crate::models::JobStatus::Failed)
        .count() as i64;
    let rows_synced = in_window.iter().map(|j| j.processed_rows).sum();

    Ok(Envelope::ok(SyncStats {
        period: query.period,
        completed_jobs,
        failed_jobs,
        rows_synced,
        live: state.monitor.statistics(),
    }))
}
