use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use typed_builder::TypedBuilder;
use uuid::Uuid;

/// A registered remote MySQL instance plus the local schema it is mapped to.
///
/// `local_db_name` is unique so two remotes cannot collide on one local
/// schema.
#[derive(FromRow, Debug, Clone, Serialize, Deserialize, TypedBuilder)]
#[builder(field_defaults(setter(into)))]
pub struct Connection {
    #[builder(default = Uuid::new_v4())]
    pub id: Uuid,
    pub name: String,
    pub host: String,
    pub port: u16,
    pub user: String,
    /// Encrypted at rest; never serialized back to API clients.
    #[serde(skip_serializing)]
    pub encrypted_password: String,
    pub source_database: String,
    pub local_db_name: String,
    #[builder(default = false)]
    pub tls: bool,
    #[builder(default = Utc::now())]
    pub created_at: DateTime<Utc>,
    #[builder(default = Utc::now())]
    pub updated_at: DateTime<Utc>,
}
