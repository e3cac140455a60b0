//! Pooled, ping-verified handles to the local control-plane database and to
//! every registered remote source.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use sqlx::mysql::MySqlPoolOptions;
use sqlx::MySqlPool;
use tokio::sync::RwLock;
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::Connection;

#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("remote connection '{0}' is not registered")]
    NotRegistered(Uuid),
    #[error("failed to connect to remote '{host}:{port}': {source}")]
    Connect {
        host: String,
        port: u16,
        #[source]
        source: sqlx::Error,
    },
    #[error("ping failed for remote '{0}': {1}")]
    PingFailed(Uuid, #[source] sqlx::Error),
}

/// Outcome of [`ConnectionManager::test_connection`].
#[derive(Debug, Clone, serde::Serialize)]
pub struct ConnectionTestResult {
    pub reachable: bool,
    pub latency_ms: u128,
    pub message: Option<String>,
}

/// Forces a consistent charset on every DSN so multi-byte data (emoji,
/// CJK text) survives the copy untouched.
fn build_dsn(connection: &Connection) -> String {
    format!(
        "mysql://{user}:{password}@{host}:{port}/{database}?charset=utf8mb4",
        user = connection.user,
        password = connection.encrypted_password,
        host = connection.host,
        port = connection.port,
        database = connection.source_database,
    )
}

/// Caches one pool per remote [`Connection`] plus the single local pool,
/// tearing pools down in the reverse of their creation order on shutdown.
pub struct ConnectionManager {
    local_pool: MySqlPool,
    remote_pools: RwLock<HashMap<Uuid, MySqlPool>>,
    creation_order: RwLock<Vec<Uuid>>,
    max_connections_per_pool: u32,
    acquire_timeout: Duration,
}

impl ConnectionManager {
    pub fn new(local_pool: MySqlPool, max_connections_per_pool: u32, acquire_timeout: Duration) -> Self {
        Self {
            local_pool,
            remote_pools: RwLock::new(HashMap::new()),
            creation_order: RwLock::new(Vec::new()),
            max_connections_per_pool,
            acquire_timeout,
        }
    }

    pub fn local_pool(&self) -> &MySqlPool {
        &self.local_pool
    }

    /// Returns the cached pool for a remote connection, opening and caching
    /// one on first use.
    pub async fn get_remote_pool(&self, connection: &Connection) -> Result<MySqlPool, ConnectionError> {
        if let Some(pool) = self.remote_pools.read().await.get(&connection.id) {
            return Ok(pool.clone());
        }

        let dsn = build_dsn(connection);
        let pool = MySqlPoolOptions::new()
            .max_connections(self.max_connections_per_pool)
            .acquire_timeout(self.acquire_timeout)
            .connect(&dsn)
            .await
            .map_err(|source| ConnectionError::Connect {
                host: connection.host.clone(),
                port: connection.port,
                source,
            })?;

        self.remote_pools.write().await.insert(connection.id, pool.clone());
        self.creation_order.write().await.push(connection.id);
        info!(connection_id = %connection.id, host = %connection.host, "opened remote pool");
        Ok(pool)
    }

    /// `SELECT 1` against the remote, reporting round-trip latency.
    pub async fn test_connection(&self, connection: &Connection) -> ConnectionTestResult {
        let start = Instant::now();
        match self.get_remote_pool(connection).await {
            Ok(pool) => match sqlx::query("SELECT 1").execute(&pool).await {
                Ok(_) => ConnectionTestResult {
                    reachable: true,
                    latency_ms: start.elapsed().as_millis(),
                    message: None,
                },
                Err(err) => ConnectionTestResult {
                    reachable: false,
                    latency_ms: start.elapsed().as_millis(),
                    message: Some(err.to_string()),
                },
            },
            Err(err) => ConnectionTestResult {
                reachable: false,
                latency_ms: start.elapsed().as_millis(),
                message: Some(err.to_string()),
            },
        }
    }

    /// Drops a cached pool, e.g. after a connection is deleted via the API.
    pub async fn evict(&self, connection_id: Uuid) {
        self.remote_pools.write().await.remove(&connection_id);
        self.creation_order.write().await.retain(|id| *id != connection_id);
    }

    /// Closes every remote pool in the reverse of their creation order, then
    /// the local pool, bounding the whole thing by `timeout`.
    pub async fn shutdown(&self, timeout: Duration) {
        let order: Vec<Uuid> = self.creation_order.write().await.drain(..).rev().collect();
        let mut pools = self.remote_pools.write().await;
        for id in order {
            if let Some(pool) = pools.remove(&id) {
                if tokio::time::timeout(timeout, pool.close()).await.is_err() {
                    warn!(connection_id = %id, "remote pool close timed out");
                }
            }
        }
        drop(pools);
        if tokio::time::timeout(timeout, self.local_pool.close()).await.is_err() {
            warn!("local pool close timed out");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dsn_forces_utf8mb4() {
        let connection = Connection::builder()
            .name("primary")
            .host("db.internal")
            .port(3306u16)
            .user("svc")
            .encrypted_password("secret")
            .source_database("app")
            .local_db_name("app_local")
            .build();
        let dsn = build_dsn(&connection);
        assert!(dsn.ends_with("?charset=utf8mb4"));
        assert!(dsn.contains("db.internal:3306"));
    }
}
