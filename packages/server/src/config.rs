//! Layered application configuration: defaults < file < environment < CLI flags.

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use serde::{Deserialize, Serialize};

/// Application configuration consumed by every component constructor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Connection string for the local (target) MySQL instance.
    pub local_database_url: String,
    /// HTTP port the control-plane API listens on.
    pub port: u16,

    /// Gate on whether the Job Engine accepts and executes work at all.
    pub sync_enabled: bool,
    /// Worker pool size / `max_concurrency`.
    pub sync_max_concurrency: usize,
    /// Default rows per batch.
    pub sync_batch_size: u32,
    /// Per-batch retry attempts before a table is marked failed.
    pub sync_retry_attempts: u32,
    /// Backoff between retry attempts.
    pub sync_retry_delay_ms: u64,
    /// Overall per-job timeout.
    pub sync_job_timeout_secs: u64,
    /// Age past which terminal (completed/failed/cancelled) jobs and their
    /// logs are pruned by the background cleanup loop.
    pub sync_cleanup_age_secs: u64,

    /// Maximum age of a `pending` job eligible for automatic resubmission at startup.
    pub resumption_window_hours: i64,

    /// Graceful shutdown deadline.
    pub shutdown_timeout_secs: u64,

    /// Remote pool acquire/connect timeout; also used as the per-connection
    /// socket timeout budget.
    pub connection_acquire_timeout_secs: u64,
    /// Fixed-size local pool used by the Connection Manager for the target
    /// database, separate from the per-remote pools it creates on demand.
    pub local_pool_max_connections: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            local_database_url: "mysql://root@127.0.0.1:3306/sync_control".to_string(),
            port: 8080,
            sync_enabled: true,
            sync_max_concurrency: 4,
            sync_batch_size: 1000,
            sync_retry_attempts: 3,
            sync_retry_delay_ms: 2000,
            sync_job_timeout_secs: 3600,
            sync_cleanup_age_secs: 30 * 24 * 3600,
            resumption_window_hours: 24,
            shutdown_timeout_secs: 30,
            connection_acquire_timeout_secs: 10,
            local_pool_max_connections: 5,
        }
    }
}

/// Command-line overrides. Any field left `None` falls through to the
/// file/environment-derived value; any field set here wins, since CLI is
/// the highest-priority source.
#[derive(Debug, Parser, Default)]
#[command(name = "sync-service", about = "MySQL table sync control plane")]
pub struct CliArgs {
    #[arg(long)]
    pub port: Option<u16>,

    #[arg(long)]
    pub local_database_url: Option<String>,

    #[arg(long)]
    pub sync_max_concurrency: Option<usize>,

    #[arg(long)]
    pub sync_batch_size: Option<u32>,

    /// Optional path to a config file (lowest-priority source, TOML/JSON/YAML
    /// auto-detected by the `config` crate).
    #[arg(long)]
    pub config_file: Option<String>,
}

impl Config {
    /// Load configuration: defaults < optional config file < environment
    /// variables (`SYNC_*`) < CLI flags.
    pub fn load(cli: CliArgs) -> Result<Self> {
        let _ = dotenvy::dotenv();

        let mut builder =
            config::Config::builder().add_source(config::Config::try_from(&Config::default())?);

        if let Some(path) = &cli.config_file {
            builder = builder.add_source(config::File::with_name(path));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("SYNC")
                .try_parsing(true)
                .separator("__"),
        );

        let mut cfg: Config = builder
            .build()
            .context("failed to assemble layered configuration")?
            .try_deserialize()
            .context("failed to deserialize configuration")?;

        if let Some(v) = cli.port {
            cfg.port = v;
        }
        if let Some(v) = cli.local_database_url {
            cfg.local_database_url = v;
        }
        if let Some(v) = cli.sync_max_concurrency {
            cfg.sync_max_concurrency = v;
        }
        if let Some(v) = cli.sync_batch_size {
            cfg.sync_batch_size = v;
        }

        Ok(cfg)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.sync_retry_delay_ms)
    }

    pub fn job_timeout(&self) -> Duration {
        Duration::from_secs(self.sync_job_timeout_secs)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    pub fn cleanup_age(&self) -> Duration {
        Duration::from_secs(self.sync_cleanup_age_secs)
    }

    pub fn connection_acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.connection_acquire_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let cfg = Config::default();
        assert!(cfg.sync_enabled);
        assert_eq!(cfg.sync_max_concurrency, 4);
        assert_eq!(cfg.resumption_window_hours, 24);
    }

    #[test]
    fn cli_flags_override_defaults() {
        let cli = CliArgs {
            port: Some(9090),
            sync_batch_size: Some(500),
            ..Default::default()
        };
        let cfg = Config::load(cli).expect("config should load from defaults alone");
        assert_eq!(cfg.port, 9090);
        assert_eq!(cfg.sync_batch_size, 500);
    }
}
