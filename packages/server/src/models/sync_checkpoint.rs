use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use typed_builder::TypedBuilder;
use uuid::Uuid;

/// The durable watermark used to resume incremental syncs; advances only
/// monotonically. Exactly one checkpoint per `table_mapping_id` — enforced
/// at the database by a `UNIQUE(table_mapping_id)` constraint, which also
/// serializes concurrent writers.
#[derive(FromRow, Debug, Clone, Serialize, Deserialize, TypedBuilder)]
#[builder(field_defaults(setter(into)))]
pub struct SyncCheckpoint {
    #[builder(default = Uuid::new_v4())]
    pub id: Uuid,
    pub table_mapping_id: Uuid,
    #[builder(default, setter(strip_option))]
    pub last_sync_time: Option<DateTime<Utc>>,
    #[builder(default, setter(strip_option))]
    pub last_sync_value: Option<String>,
    #[builder(default, setter(strip_option))]
    pub checkpoint_data: Option<sqlx::types::Json<serde_json::Value>>,
    #[builder(default = Utc::now())]
    pub created_at: DateTime<Utc>,
    #[builder(default = Utc::now())]
    pub updated_at: DateTime<Utc>,
}
