//! Batched row transfer: builds the per-batch `SELECT`/`INSERT`, commits one
//! transaction per batch, and advances the checkpoint atomically with the
//! batch that produced it.

use sqlx::{MySqlPool, Row, ValueRef};
use tokio_util::sync::CancellationToken;

use crate::models::ConflictResolution;

use super::introspect::SourceSchema;
use super::SyncEngineError;

fn quote_ident(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// One page of rows read from the source, as column-ordered text values.
/// `None` means SQL NULL. Decoding everything as text is what lets this
/// engine move rows between tables whose column types it has never heard of.
pub struct Page {
    pub rows: Vec<Vec<Option<String>>>,
    pub max_watermark: Option<String>,
}

pub async fn truncate_target(pool: &MySqlPool, target_table: &str) -> Result<(), SyncEngineError> {
    sqlx::query(&format!("TRUNCATE TABLE {}", quote_ident(target_table)))
        .execute(pool)
        .await?;
    Ok(())
}

/// Fetches up to `batch_size` rows. In incremental mode, rows are selected
/// where `watermark > after` ordered ascending; in full mode, plain
/// offset-based paging is used since there is no cursor column.
pub async fn fetch_page(
    pool: &MySqlPool,
    database: &str,
    source_table: &str,
    schema: &SourceSchema,
    where_filter: Option<&str>,
    watermark_column: Option<&str>,
    after: Option<&str>,
    offset: u64,
    batch_size: u32,
) -> Result<Page, SyncEngineError> {
    let column_list = schema
        .columns
        .iter()
        .map(|c| quote_ident(&c.name))
        .collect::<Vec<_>>()
        .join(", ");

    let mut sql = format!(
        "SELECT {columns} FROM `{db}`.{table}",
        columns = column_list,
        db = database,
        table = quote_ident(source_table),
    );

    let mut clauses = Vec::new();
    if let Some(filter) = where_filter {
        clauses.push(format!("({filter})"));
    }
    if let (Some(watermark), Some(_)) = (watermark_column, after) {
        clauses.push(format!("{} > ?", quote_ident(watermark)));
    }
    if !clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }

    if let Some(watermark) = watermark_column {
        sql.push_str(&format!(" ORDER BY {} ASC", quote_ident(watermark)));
        sql.push_str(&format!(" LIMIT {}", batch_size));
    } else {
        sql.push_str(&format!(" LIMIT {} OFFSET {}", batch_size, offset));
    }

    let mut query = sqlx::query(&sql);
    if watermark_column.is_some() {
        if let Some(value) = after {
            query = query.bind(value);
        }
    }

    let rows = query.fetch_all(pool).await?;

    let mut page_rows = Vec::with_capacity(rows.len());
    let mut max_watermark = after.map(|s| s.to_string());
    let watermark_idx = watermark_column.and_then(|w| {
        schema
            .columns
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(w))
    });

    for row in &rows {
        let mut values = Vec::with_capacity(schema.columns.len());
        for idx in 0..schema.columns.len() {
            let raw = row.try_get_raw(idx)?;
            let value = if raw.is_null() {
                None
            } else {
                Some(
                    <&str as sqlx::Decode<sqlx::MySql>>::decode(raw)
                        .map(|s| s.to_string())
                        .unwrap_or_default(),
                )
            };
            if let Some(w_idx) = watermark_idx {
                if w_idx == idx {
                    if let Some(v) = &value {
                        max_watermark = Some(v.clone());
                    }
                }
            }
            values.push(value);
        }
        page_rows.push(values);
    }

    Ok(Page {
        rows: page_rows,
        max_watermark,
    })
}

/// Inserts one page inside its own transaction, using the conflict policy
/// to pick `INSERT ... ON DUPLICATE KEY UPDATE` (overwrite + a primary key
/// exists), `INSERT IGNORE` (skip), or a plain `INSERT` (overwrite onto an
/// already-truncated, key-less target).
pub async fn insert_page(
    pool: &MySqlPool,
    target_table: &str,
    schema: &SourceSchema,
    page: &Page,
    conflict_resolution: ConflictResolution,
) -> Result<u64, SyncEngineError> {
    if page.rows.is_empty() {
        return Ok(0);
    }

    let column_names: Vec<String> = schema.columns.iter().map(|c| quote_ident(&c.name)).collect();
    let placeholders = format!("({})", vec!["?"; column_names.len()].join(", "));
    let values_clause = vec![placeholders; page.rows.len()].join(", ");

    let verb = match conflict_resolution {
        ConflictResolution::Skip => "INSERT IGNORE",
        ConflictResolution::Overwrite => "INSERT",
    };

    let mut sql = format!(
        "{verb} INTO {table} ({columns}) VALUES {values}",
        verb = verb,
        table = quote_ident(target_table),
        columns = column_names.join(", "),
        values = values_clause,
    );

    if conflict_resolution == ConflictResolution::Overwrite && !schema.primary_key.is_empty() {
        let updates = column_names
            .iter()
            .map(|c| format!("{c} = VALUES({c})"))
            .collect::<Vec<_>>()
            .join(", ");
        sql.push_str(" ON DUPLICATE KEY UPDATE ");
        sql.push_str(&updates);
    }

    let mut tx = pool.begin().await?;
    let mut query = sqlx::query(&sql);
    for row in &page.rows {
        for value in row {
            query = query.bind(value.clone());
        }
    }
    let outcome = query.execute(&mut *tx).await?;
    tx.commit().await?;

    Ok(outcome.rows_affected())
}

/// Cooperative cancellation is checked only at page boundaries — never
/// mid-batch, since a batch in flight must commit or roll back as a unit.
pub fn is_cancelled(cancel: &CancellationToken) -> bool {
    cancel.is_cancelled()
}
