//! Durable entity types shared by the Repository, Sync Engine, Job Engine and API layers.

mod connection;
mod sync_checkpoint;
mod sync_config;
mod sync_job;
mod sync_log;
mod table_mapping;

pub use connection::Connection;
pub use sync_checkpoint::SyncCheckpoint;
pub use sync_config::{ConflictResolution, SyncConfig, SyncMode, SyncOptions};
pub use sync_job::{JobStatus, SyncJob};
pub use sync_log::{LogLevel, SyncLog};
pub use table_mapping::TableMapping;
