//! IntrospectionProvider trait definition.
//!
//! Abstracts over the different ways of learning a database's tables,
//! columns and foreign keys. Implementations exist for SQLite, PostgreSQL
//! (behind the `postgres` feature) and fixed in-memory metadata.

use async_trait::async_trait;

use super::types::*;

/// Result type for metadata operations.
pub type MetadataResult<T> = Result<T, MetadataError>;

/// Error type for introspection.
#[derive(Debug, thiserror::Error)]
pub enum MetadataError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Table not found: {0}")]
    TableNotFound(String),
}

/// Trait for fetching database metadata.
///
/// # Example
///
/// ```ignore
/// use rowgraph::metadata::{IntrospectionProvider, SqliteProvider};
///
/// async fn example(provider: &impl IntrospectionProvider) -> MetadataResult<()> {
///     let tables = provider.list_tables("main").await?;
///     let customers = provider.get_table("main", "customers").await?;
///     let everything = provider.introspect("main").await?;
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait IntrospectionProvider: Send + Sync {
    /// List all tables in a schema.
    async fn list_tables(&self, schema: &str) -> MetadataResult<Vec<TableInfo>>;

    /// Get complete metadata for a table.
    async fn get_table(&self, schema: &str, table: &str) -> MetadataResult<TableMetadata>;

    /// Batch fetch multiple tables.
    ///
    /// Default implementation fetches tables concurrently using `join_all`.
    async fn get_tables_batch(&self, tables: &[TableInfo]) -> MetadataResult<Vec<TableMetadata>> {
        let futures: Vec<_> = tables
            .iter()
            .map(|t| self.get_table(&t.schema, &t.name))
            .collect();

        let results = futures::future::join_all(futures).await;

        // Collect results, failing if any failed
        results.into_iter().collect()
    }

    /// Fetch metadata for every table in a schema.
    async fn introspect(&self, schema: &str) -> MetadataResult<Vec<TableMetadata>> {
        let tables = self.list_tables(schema).await?;
        self.get_tables_batch(&tables).await
    }
}

/// Serves fixed metadata, useful for tests and for schemas described in
/// configuration rather than read from a live database.
#[derive(Debug, Clone, Default)]
pub struct StaticProvider {
    tables: Vec<TableMetadata>,
}

impl StaticProvider {
    pub fn new(tables: Vec<TableMetadata>) -> Self {
        Self { tables }
    }
}

#[async_trait]
impl IntrospectionProvider for StaticProvider {
    async fn list_tables(&self, schema: &str) -> MetadataResult<Vec<TableInfo>> {
        Ok(self
            .tables
            .iter()
            .filter(|t| t.schema == schema)
            .map(TableMetadata::info)
            .collect())
    }

    async fn get_table(&self, schema: &str, table: &str) -> MetadataResult<TableMetadata> {
        self.tables
            .iter()
            .find(|t| t.schema == schema && t.name == table)
            .cloned()
            .ok_or_else(|| MetadataError::TableNotFound(format!("{}.{}", schema, table)))
    }
}
