//! Source-schema introspection via `INFORMATION_SCHEMA`.

use sqlx::MySqlPool;

use super::SyncEngineError;

#[derive(Debug, Clone)]
pub struct ColumnDef {
    pub name: String,
    /// MySQL's own rendering of the column type, e.g. `varchar(32)`, `int(11)`.
    pub column_type: String,
    pub is_nullable: bool,
    pub character_set_name: Option<String>,
    pub collation_name: Option<String>,
    pub column_key: String,
}

impl ColumnDef {
    pub fn is_text(&self) -> bool {
        self.character_set_name.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct SourceSchema {
    pub columns: Vec<ColumnDef>,
    pub table_collation: Option<String>,
    pub table_charset: Option<String>,
    pub primary_key: Vec<String>,
}

impl SourceSchema {
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name.eq_ignore_ascii_case(name))
    }

    pub fn column_type_of(&self, name: &str) -> Option<&str> {
        self.columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
            .map(|c| c.column_type.as_str())
    }
}

#[derive(sqlx::FromRow)]
struct ColumnRow {
    column_name: String,
    column_type: String,
    is_nullable: String,
    character_set_name: Option<String>,
    collation_name: Option<String>,
    column_key: String,
}

/// Reads ordered column definitions, table-level collation/charset, and
/// primary-key columns for `database.table`.
pub async fn introspect_source(
    pool: &MySqlPool,
    database: &str,
    table: &str,
) -> Result<SourceSchema, SyncEngineError> {
    let rows = sqlx::query_as::<_, ColumnRow>(
        r#"
        SELECT column_name, column_type, is_nullable, character_set_name, collation_name, column_key
        FROM information_schema.columns
        WHERE table_schema = ? AND table_name = ?
        ORDER BY ordinal_position ASC
        "#,
    )
    .bind(database)
    .bind(table)
    .fetch_all(pool)
    .await?;

    if rows.is_empty() {
        return Err(SyncEngineError::SourceTableNotFound {
            database: database.to_string(),
            table: table.to_string(),
        });
    }

    let primary_key = rows
        .iter()
        .filter(|r| r.column_key == "PRI")
        .map(|r| r.column_name.clone())
        .collect();

    let columns = rows
        .into_iter()
        .map(|r| ColumnDef {
            name: r.column_name,
            column_type: r.column_type,
            is_nullable: r.is_nullable.eq_ignore_ascii_case("YES"),
            character_set_name: r.character_set_name,
            collation_name: r.collation_name,
            column_key: r.column_key,
        })
        .collect();

    let (table_collation, table_charset): (Option<String>, Option<String>) = sqlx::query_as(
        r#"
        SELECT t.table_collation, c.character_set_name
        FROM information_schema.tables t
        LEFT JOIN information_schema.collations c ON c.collation_name = t.table_collation
        WHERE t.table_schema = ? AND t.table_name = ?
        "#,
    )
    .bind(database)
    .bind(table)
    .fetch_one(pool)
    .await?;

    Ok(SourceSchema {
        columns,
        table_collation,
        table_charset,
        primary_key,
    })
}

/// True if the database already has a table by this name; avoids a failed
/// `CREATE TABLE` racing a concurrent sync of the same mapping.
pub async fn target_table_exists(
    pool: &MySqlPool,
    database: &str,
    table: &str,
) -> Result<bool, SyncEngineError> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM information_schema.tables WHERE table_schema = ? AND table_name = ?",
    )
    .bind(database)
    .bind(table)
    .fetch_one(pool)
    .await?;
    Ok(count > 0)
}

/// True if `column` has any index declared on it — used to decide whether an
/// incremental watermark column can be used without a full scan warning.
pub async fn column_is_indexed(
    pool: &MySqlPool,
    database: &str,
    table: &str,
    column: &str,
) -> Result<bool, SyncEngineError> {
    let count: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM information_schema.statistics
        WHERE table_schema = ? AND table_name = ? AND column_name = ?
        "#,
    )
    .bind(database)
    .bind(table)
    .bind(column)
    .fetch_one(pool)
    .await?;
    Ok(count > 0)
}

fn is_timestamp_like(column_type: &str) -> bool {
    let lower = column_type.to_ascii_lowercase();
    lower.starts_with("timestamp") || lower.starts_with("datetime") || lower.starts_with("date")
}

/// Finds the first indexed timestamp/datetime/date column, in column order,
/// to use as an implicit watermark when a mapping doesn't configure one.
/// Returns `None` if no such column exists.
pub async fn discover_watermark_column(
    pool: &MySqlPool,
    database: &str,
    table: &str,
    schema: &SourceSchema,
) -> Result<Option<String>, SyncEngineError> {
    for column in schema.columns.iter().filter(|c| is_timestamp_like(&c.column_type)) {
        if column_is_indexed(pool, database, table, &column.name).await? {
            return Ok(Some(column.name.clone()));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_datetime_and_date_are_watermark_candidates() {
        assert!(is_timestamp_like("timestamp"));
        assert!(is_timestamp_like("datetime(3)"));
        assert!(is_timestamp_like("DATE"));
        assert!(!is_timestamp_like("varchar(255)"));
        assert!(!is_timestamp_like("int(11)"));
    }
}
