use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use typed_builder::TypedBuilder;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, Default)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    /// Terminal statuses are absorbing: once reached, a job never moves again.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }
}

/// A single execution instance of a sync configuration.
#[derive(FromRow, Debug, Clone, Serialize, Deserialize, TypedBuilder)]
#[builder(field_defaults(setter(into)))]
pub struct SyncJob {
    #[builder(default = Uuid::new_v4())]
    pub id: Uuid,
    pub config_id: Uuid,
    #[builder(default)]
    pub status: JobStatus,
    #[builder(default = Utc::now())]
    pub created_at: DateTime<Utc>,
    #[builder(default, setter(strip_option))]
    pub start_time: Option<DateTime<Utc>>,
    #[builder(default, setter(strip_option))]
    pub end_time: Option<DateTime<Utc>>,
    #[builder(default = 0)]
    pub total_tables: i32,
    #[builder(default = 0)]
    pub completed_tables: i32,
    #[builder(default = 0)]
    pub total_rows: i64,
    #[builder(default = 0)]
    pub processed_rows: i64,
    #[builder(default, setter(strip_option))]
    pub error_message: Option<String>,
}

impl SyncJob {
    pub fn is_ready_to_resume(&self, resumption_window_hours: i64) -> bool {
        self.status == JobStatus::Pending
            && Utc::now() - self.created_at <= chrono::Duration::hours(resumption_window_hours)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_statuses_are_absorbing() {
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(JobStatus::Cancelled.is_terminal());
        assert!(!JobStatus::Pending.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
    }

    #[test]
    fn resumption_window_respects_age() {
        let mut job = SyncJob::builder().config_id(Uuid::new_v4()).build();
        job.created_at = Utc::now() - chrono::Duration::hours(1);
        assert!(job.is_ready_to_resume(24));

        job.created_at = Utc::now() - chrono::Duration::hours(48);
        assert!(!job.is_ready_to_resume(24));
    }
}
