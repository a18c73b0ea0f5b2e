//! PostgreSQL introspection through `information_schema`.

use async_trait::async_trait;
use sqlx::postgres::PgPool;
use sqlx::Row;

use super::provider::{IntrospectionProvider, MetadataError, MetadataResult};
use super::types::*;

const LIST_TABLES: &str = r#"
SELECT table_name::text AS name
FROM information_schema.tables
WHERE table_schema = $1 AND table_type = 'BASE TABLE'
ORDER BY table_name
"#;

const COLUMNS: &str = r#"
SELECT
    c.column_name::text AS name,
    c.data_type::text AS native_type,
    (c.is_nullable = 'YES') AS nullable,
    EXISTS (
        SELECT 1
        FROM information_schema.table_constraints tc
        JOIN information_schema.key_column_usage kcu
          ON tc.constraint_name = kcu.constraint_name
         AND tc.table_schema = kcu.table_schema
        WHERE tc.constraint_type = 'PRIMARY KEY'
          AND tc.table_schema = c.table_schema
          AND tc.table_name = c.table_name
          AND kcu.column_name = c.column_name
    ) AS primary_key
FROM information_schema.columns c
WHERE c.table_schema = $1 AND c.table_name = $2
ORDER BY c.ordinal_position
"#;

const FOREIGN_KEYS: &str = r#"
SELECT
    kcu.column_name::text AS column_name,
    ccu.table_name::text AS referenced_table,
    ccu.column_name::text AS referenced_column,
    COUNT(*) OVER (PARTITION BY tc.constraint_name) AS width
FROM information_schema.table_constraints tc
JOIN information_schema.key_column_usage kcu
  ON tc.constraint_name = kcu.constraint_name
 AND tc.table_schema = kcu.table_schema
JOIN information_schema.constraint_column_usage ccu
  ON ccu.constraint_name = tc.constraint_name
 AND ccu.constraint_schema = tc.table_schema
WHERE tc.constraint_type = 'FOREIGN KEY'
  AND tc.table_schema = $1
  AND tc.table_name = $2
ORDER BY kcu.column_name
"#;

/// Reads table metadata from a PostgreSQL pool.
#[derive(Debug, Clone)]
pub struct PostgresProvider {
    pool: PgPool,
}

impl PostgresProvider {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl IntrospectionProvider for PostgresProvider {
    async fn list_tables(&self, schema: &str) -> MetadataResult<Vec<TableInfo>> {
        let rows = sqlx::query(LIST_TABLES)
            .bind(schema)
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| {
                Ok(TableInfo {
                    schema: schema.to_string(),
                    name: row.try_get("name")?,
                })
            })
            .collect()
    }

    async fn get_table(&self, schema: &str, table: &str) -> MetadataResult<TableMetadata> {
        let rows = sqlx::query(COLUMNS)
            .bind(schema)
            .bind(table)
            .fetch_all(&self.pool)
            .await?;

        if rows.is_empty() {
            return Err(MetadataError::TableNotFound(format!("{}.{}", schema, table)));
        }

        let columns = rows
            .iter()
            .map(|row| {
                Ok(ColumnMetadata {
                    name: row.try_get("name")?,
                    native_type: row.try_get("native_type")?,
                    nullable: row.try_get("nullable")?,
                    primary_key: row.try_get("primary_key")?,
                })
            })
            .collect::<MetadataResult<Vec<_>>>()?;

        let fk_rows = sqlx::query(FOREIGN_KEYS)
            .bind(schema)
            .bind(table)
            .fetch_all(&self.pool)
            .await?;

        let mut foreign_keys = Vec::new();
        for row in &fk_rows {
            let column: String = row.try_get("column_name")?;
            if row.try_get::<i64, _>("width")? != 1 {
                tracing::warn!(table = %table, column = %column, "skipping composite foreign key");
                continue;
            }
            foreign_keys.push(ForeignKeyInfo {
                column,
                referenced_table: row.try_get("referenced_table")?,
                referenced_column: row.try_get("referenced_column")?,
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
