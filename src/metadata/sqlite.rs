//! SQLite introspection through `sqlite_master` and the table-valued pragmas.

use std::collections::BTreeMap;

use async_trait::async_trait;
use sqlx::sqlite::SqlitePool;
use sqlx::Row;

use super::provider::{IntrospectionProvider, MetadataError, MetadataResult};
use super::types::*;

/// Reads table metadata from a SQLite pool.
///
/// SQLite has a single user schema per database file, so the `schema`
/// argument is only carried through into the reported metadata.
#[derive(Debug, Clone)]
pub struct SqliteProvider {
    pool: SqlitePool,
}

impl SqliteProvider {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl IntrospectionProvider for SqliteProvider {
    async fn list_tables(&self, schema: &str) -> MetadataResult<Vec<TableInfo>> {
        let rows = sqlx::query(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(TableInfo {
                    schema: schema.to_string(),
                    name: row.try_get::<String, _>("name")?,
                })
            })
            .collect()
    }

    async fn get_table(&self, schema: &str, table: &str) -> MetadataResult<TableMetadata> {
        let rows = sqlx::query(
            "SELECT name, type, \"notnull\", pk FROM pragma_table_info(?) ORDER BY cid",
        )
        .bind(table)
        .fetch_all(&self.pool)
        .await?;

        if rows.is_empty() {
            return Err(MetadataError::TableNotFound(format!("{}.{}", schema, table)));
        }

        let mut columns = Vec::with_capacity(rows.len());
        for row in &rows {
            let not_null = row.try_get::<i64, _>("notnull")? != 0;
            let primary_key = row.try_get::<i64, _>("pk")? != 0;
            columns.push(ColumnMetadata {
                name: row.try_get("name")?,
                native_type: row.try_get("type")?,
                nullable: !not_null && !primary_key,
                primary_key,
            });
        }

        let fk_rows = sqlx::query(
            "SELECT id, \"from\", \"table\", \"to\" FROM pragma_foreign_key_list(?) ORDER BY id, seq",
        )
        .bind(table)
        .fetch_all(&self.pool)
        .await?;

        // Grouped by constraint id; composite keys span several rows.
        let mut grouped: BTreeMap<i64, Vec<(String, String, Option<String>)>> = BTreeMap::new();
        for row in &fk_rows {
            grouped.entry(row.try_get("id")?).or_default().push((
                row.try_get("from")?,
                row.try_get("table")?,
                row.try_get("to")?,
            ));
        }

        let mut foreign_keys = Vec::new();
        for (_, parts) in grouped {
            let count = parts.len();
            let mut parts = parts.into_iter();
            let (Some((column, referenced_table, to)), None) = (parts.next(), parts.next()) else {
                tracing::warn!(table = %table, columns = count, "skipping composite foreign key");
                continue;
            };
            let referenced_column = match to {
                Some(to) => to,
                // `REFERENCES t` without a column targets t's primary key.
                None => self.primary_key_of(&referenced_table).await?,
            };
            foreign_keys.push(ForeignKeyInfo {
                column,
                referenced_table,
                referenced_column,
            });
        }

        Ok(TableMetadata {
            schema: schema.to_string(),
            name: table.to_string(),
            columns,
            foreign_keys,
        })
    }
}

impl SqliteProvider {
    async fn primary_key_of(&self, table: &str) -> MetadataResult<String> {
        let row = sqlx::query("SELECT name FROM pragma_table_info(?) WHERE pk > 0 ORDER BY pk LIMIT 1")
            .bind(table)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(row.try_get("name")?),
            None => Err(MetadataError::TableNotFound(table.to_string())),
        }
    }
}
