//! Sync Execution Core — replicates whole tables from remote MySQL databases
//! into a local MySQL instance, driven by user-managed sync configurations.
//!
//! Module map:
//! - [`models`] — durable entity types shared by every layer below.
//! - [`repository`] — durable state: connections, configs, mappings, jobs, logs, checkpoints.
//! - [`connection_manager`] — pooled, ping-verified handles to remote and local MySQL.
//! - [`monitor`] — in-memory active-job tracking; zombie-free by construction.
//! - [`sync_engine`] — stateless per-table transfer worker.
//! - [`job_engine`] — queueing, worker pool, pending-job resumption.
//! - [`api`] — thin axum control-plane surface over the core.

pub mod api;
pub mod config;
pub mod connection_manager;
pub mod error;
pub mod job_engine;
pub mod models;
pub mod monitor;
pub mod repository;
pub mod sync_engine;

pub use config::Config;
pub use error::AppError;
