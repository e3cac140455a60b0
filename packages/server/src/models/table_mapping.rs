use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use typed_builder::TypedBuilder;
use uuid::Uuid;

use super::SyncMode;

/// A source→target table pair with its own sync mode, enablement, optional
/// WHERE filter, and sort order within the config.
///
/// Unique on `(config_id, source_table)`; `sort_order` defines the table
/// execution order within a job.
#[derive(FromRow, Debug, Clone, Serialize, Deserialize, TypedBuilder)]
#[builder(field_defaults(setter(into)))]
pub struct TableMapping {
    #[builder(default = Uuid::new_v4())]
    pub id: Uuid,
    pub config_id: Uuid,
    pub source_table: String,
    pub target_table: String,
    #[builder(default, setter(strip_option))]
    pub sync_mode: Option<SyncMode>,
    #[builder(default = true)]
    pub enabled: bool,
    #[builder(default, setter(strip_option))]
    pub where_filter: Option<String>,
    /// Watermark column for incremental mode; if unset the engine picks the
    /// first indexed timestamp column, degrading to full mode if none exists.
    #[builder(default, setter(strip_option))]
    pub watermark_column: Option<String>,
    #[builder(default = 0)]
    pub sort_order: i32,
    #[builder(default = Utc::now())]
    pub created_at: DateTime<Utc>,
    #[builder(default = Utc::now())]
    pub updated_at: DateTime<Utc>,
}

impl TableMapping {
    /// The effective mode for this table, falling back to the config default.
    pub fn effective_mode(&self, config_default: SyncMode) -> SyncMode {
        self.sync_mode.unwrap_or(config_default)
    }
}
