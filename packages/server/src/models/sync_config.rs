use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use typed_builder::TypedBuilder;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, Default)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SyncMode {
    #[default]
    Full,
    Incremental,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, Default)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ConflictResolution {
    #[default]
    Overwrite,
    Skip,
}

/// The options blob carried by `SyncConfig`, persisted as a JSON column.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncOptions {
    pub batch_size: u32,
    pub max_concurrency: u32,
    pub compression: bool,
    pub conflict_resolution: ConflictResolution,
    pub fail_fast: bool,
    pub retry_attempts: u32,
    pub retry_delay_ms: u64,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            batch_size: 1000,
            max_concurrency: 1,
            compression: false,
            conflict_resolution: ConflictResolution::Overwrite,
            fail_fast: false,
            retry_attempts: 3,
            retry_delay_ms: 2000,
        }
    }
}

/// A named, durable description of what to sync between one remote and one
/// local database.
#[derive(FromRow, Debug, Clone, Serialize, Deserialize, TypedBuilder)]
#[builder(field_defaults(setter(into)))]
pub struct SyncConfig {
    #[builder(default = Uuid::new_v4())]
    pub id: Uuid,
    pub connection_id: Uuid,
    pub name: String,
    #[builder(default)]
    pub default_sync_mode: SyncMode,
    /// Opaque to the core; consumed only by an external scheduler, if any.
    #[builder(default, setter(strip_option))]
    pub schedule: Option<String>,
    #[builder(default = true)]
    pub enabled: bool,
    #[builder(default)]
    pub options: sqlx::types::Json<SyncOptions>,
    pub source_db: String,
    pub target_db: String,
    #[builder(default = Utc::now())]
    pub created_at: DateTime<Utc>,
    #[builder(default = Utc::now())]
    pub updated_at: DateTime<Utc>,
}

impl SyncConfig {
    pub fn options(&self) -> &SyncOptions {
        &self.options.0
    }
}
