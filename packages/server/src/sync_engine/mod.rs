//! Stateless per-table transfer worker: reads source schema, ensures the
//! target table exists, and transfers rows in batches.

mod copy;
mod ddl;
pub mod introspect;

use sqlx::MySqlPool;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::models::{ConflictResolution, SyncMode, TableMapping};
use crate::repository::{Repository, RepositoryError};

use introspect::SourceSchema;

#[derive(Debug, thiserror::Error)]
pub enum SyncEngineError {
    #[error("source table `{database}`.`{table}` not found")]
    SourceTableNotFound { database: String, table: String },
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),
    #[error("sync cancelled")]
    Cancelled,
    #[error("table has no usable columns")]
    EmptySchema,
}

#[derive(Debug, Clone)]
pub struct TableSyncOutcome {
    pub rows_processed: i64,
    pub final_checkpoint_value: Option<String>,
    pub degraded_to_full: bool,
}

/// Per-call parameters the Job Engine assembles for one table; mirrors the
/// effective options resolved from `SyncConfig`/`TableMapping`.
pub struct TableSyncContext<'a> {
    pub source_pool: &'a MySqlPool,
    pub source_database: &'a str,
    pub target_pool: &'a MySqlPool,
    pub target_database: &'a str,
    pub mapping: &'a TableMapping,
    pub effective_mode: SyncMode,
    pub batch_size: u32,
    pub conflict_resolution: ConflictResolution,
    pub retry_attempts: u32,
    pub retry_delay: std::time::Duration,
    pub cancel: &'a CancellationToken,
}

/// Callback invoked after every successfully committed batch so the Monitor
/// can be updated without the Sync Engine depending on it directly.
pub type ProgressCallback<'a> = dyn Fn(i64) + Send + Sync + 'a;

pub struct SyncEngine;

impl Default for SyncEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncEngine {
    pub fn new() -> Self {
        Self
    }

    /// Runs the full six-step algorithm for one table mapping.
    pub async fn sync_table(
        &self,
        repository: &dyn Repository,
        ctx: &TableSyncContext<'_>,
        on_progress: &ProgressCallback<'_>,
    ) -> Result<TableSyncOutcome, SyncEngineError> {
        // Step 1: source introspection.
        let schema = introspect::introspect_source(
            ctx.source_pool,
            ctx.source_database,
            &ctx.mapping.source_table,
        )
        .await?;
        if schema.columns.is_empty() {
            return Err(SyncEngineError::EmptySchema);
        }

        // Step 2: target existence check + DDL synthesis.
        let target_exists =
            introspect::target_table_exists(ctx.target_pool, ctx.target_database, &ctx.mapping.target_table)
                .await?;
        if !target_exists {
            let ddl = ddl::synthesize_create_table(&ctx.mapping.target_table, &schema);
            sqlx::query(&ddl).execute(ctx.target_pool).await?;
        }

        // Incremental mode degrades to full only once no usable watermark
        // column exists: an explicitly configured column wins if present on
        // the source; otherwise the engine searches for the first indexed
        // timestamp/datetime/date column before giving up.
        let (mode, degraded, watermark_column) = match (ctx.effective_mode, &ctx.mapping.watermark_column) {
            (SyncMode::Incremental, Some(col)) if schema.has_column(col) => {
                (SyncMode::Incremental, false, Some(col.clone()))
            }
            (SyncMode::Incremental, _) => {
                match introspect::discover_watermark_column(
                    ctx.source_pool,
                    ctx.source_database,
                    &ctx.mapping.source_table,
                    &schema,
                )
                .await?
                {
                    Some(col) => {
                        warn!(
                            table = %ctx.mapping.source_table,
                            column = %col,
                            "mapping has no configured watermark column; using discovered indexed timestamp column"
                        );
                        (SyncMode::Incremental, false, Some(col))
                    }
                    None => {
                        warn!(
                            table = %ctx.mapping.source_table,
                            "incremental mode requested but no configured or discoverable watermark column exists; degrading to full sync"
                        );
                        (SyncMode::Full, true, None)
                    }
                }
            }
            (SyncMode::Full, _) => (SyncMode::Full, false, None),
        };

        let checkpoint = if mode == SyncMode::Incremental {
            repository.get_checkpoint(ctx.mapping.id).await?
        } else {
            None
        };
        let mut cursor = checkpoint.as_ref().and_then(|c| c.last_sync_value.clone());

        // Step 3: row estimation (best-effort; failures do not abort the sync).
        let _ = self.estimate_rows(ctx, &schema).await;

        // Step 4 + 5: batched copy loop with cancellation checks at page boundaries.
        if mode == SyncMode::Full && ctx.conflict_resolution == ConflictResolution::Overwrite {
            copy::truncate_target(ctx.target_pool, &ctx.mapping.target_table).await?;
        }

        let mut rows_processed: i64 = 0;
        let mut offset: u64 = 0;
        loop {
            if ctx.cancel.is_cancelled() {
                return Ok(TableSyncOutcome {
                    rows_processed,
                    final_checkpoint_value: cursor,
                    degraded_to_full: degraded,
                });
            }

            let watermark_col = watermark_column.as_deref().filter(|_| mode == SyncMode::Incremental);
            let page = self
                .fetch_page_with_retry(ctx, &schema, watermark_col, cursor.as_deref(), offset)
                .await?;

            if page.rows.is_empty() {
                break;
            }
            let page_len = page.rows.len() as u64;

            let affected = self.insert_page_with_retry(ctx, &schema, &page).await?;
            rows_processed += affected as i64;
            on_progress(affected as i64);

            if mode == SyncMode::Incremental {
                if let Some(max_watermark) = &page.max_watermark {
                    cursor = Some(max_watermark.clone());
                    repository
                        .upsert_checkpoint(ctx.mapping.id, cursor.clone(), None)
                        .await?;
                }
            }

            offset += page_len;
            if page_len < ctx.batch_size as u64 {
                break;
            }
        }

        Ok(TableSyncOutcome {
            rows_processed,
            final_checkpoint_value: cursor,
            degraded_to_full: degraded,
        })
    }

    async fn estimate_rows(
        &self,
        ctx: &TableSyncContext<'_>,
        _schema: &SourceSchema,
    ) -> Result<i64, SyncEngineError> {
        let sql = match &ctx.mapping.where_filter {
            Some(filter) => format!(
                "SELECT COUNT(*) FROM `{}`.`{}` WHERE ({})",
                ctx.source_database, ctx.mapping.source_table, filter
            ),
            None => format!(
                "SELECT COUNT(*) FROM `{}`.`{}`",
                ctx.source_database, ctx.mapping.source_table
            ),
        };
        let count: i64 = sqlx::query_scalar(&sql).fetch_one(ctx.source_pool).await?;
        Ok(count)
    }

    async fn fetch_page_with_retry(
        &self,
        ctx: &TableSyncContext<'_>,
        schema: &SourceSchema,
        watermark_col: Option<&str>,
        after: Option<&str>,
        offset: u64,
    ) -> Result<copy::Page, SyncEngineError> {
        let mut attempt = 0;
        loop {
            match copy::fetch_page(
                ctx.source_pool,
                ctx.source_database,
                &ctx.mapping.source_table,
                schema,
                ctx.mapping.where_filter.as_deref(),
                watermark_col,
                after,
                offset,
                ctx.batch_size,
            )
            .await
            {
                Ok(page) => return Ok(page),
                Err(err) if attempt < ctx.retry_attempts => {
                    attempt += 1;
                    warn!(attempt, error = %err, "retrying source page fetch");
                    tokio::time::sleep(ctx.retry_delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn insert_page_with_retry(
        &self,
        ctx: &TableSyncContext<'_>,
        schema: &SourceSchema,
        page: &copy::Page,
    ) -> Result<u64, SyncEngineError> {
        let mut attempt = 0;
        loop {
            match copy::insert_page(
                ctx.target_pool,
                &ctx.mapping.target_table,
                schema,
                page,
                ctx.conflict_resolution,
            )
            .await
            {
                Ok(affected) => return Ok(affected),
                Err(err) if attempt < ctx.retry_attempts => {
                    attempt += 1;
                    warn!(attempt, error = %err, "retrying target batch insert");
                    tokio::time::sleep(ctx.retry_delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
