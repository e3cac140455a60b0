//! Target `CREATE TABLE` synthesis that mirrors source column types,
//! nullability, and character set/collation verbatim.

use super::introspect::SourceSchema;

/// Quote a MySQL identifier, doubling any embedded backticks.
fn quote_ident(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// Builds a `CREATE TABLE IF NOT EXISTS` statement for `target_table` that
/// reproduces `schema`'s columns, applying each text column's own
/// character set/collation, and the table-level default charset/collation.
/// This is what makes 4-byte UTF-8 (emoji) round-trip without error 1366.
pub fn synthesize_create_table(target_table: &str, schema: &SourceSchema) -> String {
    let mut column_defs = Vec::with_capacity(schema.columns.len());
    for column in &schema.columns {
        let mut def = format!("{} {}", quote_ident(&column.name), column.column_type);
        if column.is_text() {
            if let Some(charset) = &column.character_set_name {
                def.push_str(&format!(" CHARACTER SET {}", charset));
            }
            if let Some(collation) = &column.collation_name {
                def.push_str(&format!(" COLLATE {}", collation));
            }
        }
        def.push_str(if column.is_nullable { " NULL" } else { " NOT NULL" });
        column_defs.push(def);
    }

    if !schema.primary_key.is_empty() {
        let pk_cols = schema
            .primary_key
            .iter()
            .map(|c| quote_ident(c))
            .collect::<Vec<_>>()
            .join(", ");
        column_defs.push(format!("PRIMARY KEY ({})", pk_cols));
    }

    let charset = schema.table_charset.as_deref().unwrap_or("utf8mb4");
    let collation = schema
        .table_collation
        .as_deref()
        .unwrap_or("utf8mb4_unicode_ci");

    format!(
        "CREATE TABLE IF NOT EXISTS {table} (\n  {columns}\n) ENGINE=InnoDB DEFAULT CHARSET={charset} COLLATE={collation}",
        table = quote_ident(target_table),
        columns = column_defs.join(",\n  "),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync_engine::introspect::ColumnDef;

    fn schema_with_emoji_column() -> SourceSchema {
        SourceSchema {
            columns: vec![
                ColumnDef {
                    name: "id".into(),
                    column_type: "int(11)".into(),
                    is_nullable: false,
                    character_set_name: None,
                    collation_name: None,
                    column_key: "PRI".into(),
                },
                ColumnDef {
                    name: "name".into(),
                    column_type: "varchar(32)".into(),
                    is_nullable: true,
                    character_set_name: Some("utf8mb4".into()),
                    collation_name: Some("utf8mb4_unicode_ci".into()),
                    column_key: String::new(),
                },
            ],
            table_collation: Some("utf8mb4_unicode_ci".into()),
            table_charset: Some("utf8mb4".into()),
            primary_key: vec!["id".into()],
        }
    }

    #[test]
    fn emoji_column_carries_utf8mb4_charset_and_collation() {
        let ddl = synthesize_create_table("t_copy", &schema_with_emoji_column());
        assert!(ddl.contains("CHARACTER SET utf8mb4"));
        assert!(ddl.contains("COLLATE utf8mb4_unicode_ci"));
        assert!(ddl.contains("DEFAULT CHARSET=utf8mb4"));
        assert!(ddl.contains("PRIMARY KEY (`id`)"));
    }

    #[test]
    fn non_text_columns_get_no_charset_clause() {
        let ddl = synthesize_create_table("t_copy", &schema_with_emoji_column());
        let id_line = ddl.lines().find(|l| l.contains("`id`")).unwrap();
        assert!(!id_line.contains("CHARACTER SET"));
    }
}
