use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

/// An append-only per-row job log entry. Deleted only via
/// config cascade.
#[derive(FromRow, Debug, Clone, Serialize, Deserialize)]
pub struct SyncLog {
    pub id: i64,
    pub job_id: Uuid,
    pub table_name: Option<String>,
    pub level: LogLevel,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

impl SyncLog {
    pub fn new(job_id: Uuid, table_name: Option<String>, level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            id: 0,
            job_id,
            table_name,
            level,
            message: message.into(),
            created_at: Utc::now(),
        }
    }
}
