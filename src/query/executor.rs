//! Statement execution against a pooled connection.
//!
//! The root statement runs first. Once its rows are known, every one-to-many
//! sub-fetch below it runs concurrently with one batched `IN (...)` query
//! each, and reassembly waits for all of them.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::{try_join_all, BoxFuture};
use futures::FutureExt;
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row as _;

use crate::schema::FieldType;
use crate::sql::{Dialect, Literal};

use super::assemble::{assemble, distinct_keys, group, key_of, Groups, Row};
use super::component::{CompiledQuery, Component, OutputColumn, Statement};
use super::error::{QueryError, QueryResult};

/// Anything that can run one SELECT and hand back decoded rows.
#[async_trait]
pub trait RowSource: Send + Sync {
    fn dialect(&self) -> Dialect;

    /// Run `sql`, decoding each of `columns` by its field type.
    async fn fetch(&self, sql: &str, columns: &[OutputColumn]) -> QueryResult<Vec<Row>>;
}

/// Pool sizing and timeouts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub acquire_timeout: Duration,
    pub idle_timeout: Option<Duration>,
    pub max_lifetime: Option<Duration>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 10,
            acquire_timeout: Duration::from_secs(5),
            idle_timeout: Some(Duration::from_secs(60)),
            max_lifetime: Some(Duration::from_secs(30 * 60)),
        }
    }
}

// =============================================================================
// Execution
// =============================================================================

/// Run a compiled query, returning one object per root row.
pub async fn execute(source: &dyn RowSource, query: &CompiledQuery) -> QueryResult<Vec<Value>> {
    let rows = fetch(source, &query.statement, &[]).await?;
    Ok(rows.into_iter().map(|(_, value)| value).collect())
}

fn fetch<'a>(
    source: &'a dyn RowSource,
    statement: &'a Statement,
    keys: &'a [Literal],
) -> BoxFuture<'a, QueryResult<Vec<(Option<String>, Value)>>> {
    async move {
        if statement.filter.is_some() && keys.is_empty() {
            return Ok(vec![]);
        }

        let sql = statement.render(source.dialect(), keys);
        tracing::debug!(table = %statement.table, keys = keys.len(), sql = %sql, "executing statement");
        let rows = source.fetch(&sql, &statement.columns).await?;

        let referenced = statement.referenced();
        let key_sets: Vec<Vec<Literal>> = referenced
            .iter()
            .map(|c| match c {
                Component::Referenced { parent_key, .. } => distinct_keys(&rows, parent_key),
                _ => vec![],
            })
            .collect();

        let sub_fetches = referenced
            .iter()
            .zip(key_sets.iter())
            .filter_map(|(c, keys)| match c {
                Component::Referenced { statement, .. } => Some(fetch(source, statement, keys)),
                _ => None,
            });
        let subs: Vec<Groups> = try_join_all(sub_fetches)
            .await?
            .into_iter()
            .map(group)
            .collect();

        Ok(rows
            .iter()
            .map(|row| {
                let key = statement
                    .filter
                    .as_ref()
                    .and_then(|f| row.get(&f.output))
                    .and_then(key_of);
                (key, assemble(&statement.components, row, &subs))
            })
            .collect())
    }
    .boxed()
}

/// A compiled query bound to the source it runs against.
///
/// Cheap to clone; live queries keep one for their whole lifetime.
#[derive(Clone)]
pub struct Executable {
    query: Arc<CompiledQuery>,
    source: Arc<dyn RowSource>,
}

impl Executable {
    pub fn new(query: CompiledQuery, source: Arc<dyn RowSource>) -> Self {
        Self {
            query: Arc::new(query),
            source,
        }
    }

    pub fn query(&self) -> &CompiledQuery {
        &self.query
    }

    pub fn root(&self) -> &str {
        &self.query.root
    }

    pub fn touched_tables(&self) -> &BTreeSet<String> {
        &self.query.touched
    }

    pub async fn run(&self) -> QueryResult<Vec<Value>> {
        execute(self.source.as_ref(), &self.query).await
    }
}

impl std::fmt::Debug for Executable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executable")
            .field("root", &self.query.root)
            .field("touched", &self.query.touched)
            .finish()
    }
}

// =============================================================================
// SQLite
// =============================================================================

/// Rows from a shared SQLite pool.
#[derive(Debug, Clone)]
pub struct SqliteSource {
    pool: SqlitePool,
}

impl SqliteSource {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open a pool for `url`.
    ///
    /// Every connection to `sqlite::memory:` is its own database, so
    /// in-memory URLs are pinned to one long-lived connection.
    pub async fn connect(url: &str, config: &PoolConfig) -> QueryResult<Self> {
        let options: SqliteConnectOptions = url.parse()?;
        let options = options.create_if_missing(true);

        let pool_options = if url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new()
                .max_connections(config.max_connections)
                .idle_timeout(config.idle_timeout)
                .max_lifetime(config.max_lifetime)
        };

        let pool = pool_options
            .acquire_timeout(config.acquire_timeout)
            .connect_with(options)
            .await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    fn decode(row: &SqliteRow, columns: &[OutputColumn]) -> QueryResult<Row> {
        let mut out = Row::with_capacity(columns.len());
        for column in columns {
            let name = column.name.as_str();
            let value = match column.field_type {
                FieldType::Int => row.try_get::<Option<i64>, _>(name)?.map(Value::from),
                // NUMERIC affinity stores whole numbers as integers.
                FieldType::Float => match row.try_get::<Option<f64>, _>(name) {
                    Ok(v) => v.map(Value::from),
                    Err(_) => row.try_get::<Option<i64>, _>(name)?.map(|i| Value::from(i as f64)),
                },
                FieldType::String => row.try_get::<Option<String>, _>(name)?.map(Value::from),
                FieldType::Bool => match row.try_get::<Option<bool>, _>(name) {
                    Ok(v) => v.map(Value::from),
                    Err(_) => row.try_get::<Option<i64>, _>(name)?.map(|i| Value::from(i != 0)),
                },
            };
            out.insert(column.name.clone(), value.unwrap_or(Value::Null));
        }
        Ok(out)
    }
}

#[async_trait]
impl RowSource for SqliteSource {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    async fn fetch(&self, sql: &str, columns: &[OutputColumn]) -> QueryResult<Vec<Row>> {
        let rows = sqlx::query(sql).fetch_all(&self.pool).await?;
        rows.iter().map(|row| Self::decode(row, columns)).collect()
    }
}

// =============================================================================
// PostgreSQL
// =============================================================================

#[cfg(feature = "postgres")]
pub use self::postgres::PostgresSource;

#[cfg(feature = "postgres")]
mod postgres {
    use super::*;
    use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};

    /// Rows from a shared PostgreSQL pool.
    #[derive(Debug, Clone)]
    pub struct PostgresSource {
        pool: PgPool,
    }

    impl PostgresSource {
        pub fn new(pool: PgPool) -> Self {
            Self { pool }
        }

        pub async fn connect(url: &str, config: &PoolConfig) -> QueryResult<Self> {
            let pool = PgPoolOptions::new()
                .max_connections(config.max_connections)
                .acquire_timeout(config.acquire_timeout)
                .idle_timeout(config.idle_timeout)
                .max_lifetime(config.max_lifetime)
                .connect(url)
                .await?;
            Ok(Self { pool })
        }

        pub fn pool(&self) -> &PgPool {
            &self.pool
        }

        fn decode(row: &PgRow, columns: &[OutputColumn]) -> QueryResult<Row> {
            let mut out = Row::with_capacity(columns.len());
            for column in columns {
                let name = column.name.as_str();
                // Float and string columns are selected with a cast to
                // double precision and text; integer widths are tried in turn.
                let value = match column.field_type {
                    FieldType::Int => match row.try_get::<Option<i64>, _>(name) {
                        Ok(v) => v.map(Value::from),
                        Err(_) => match row.try_get::<Option<i32>, _>(name) {
                            Ok(v) => v.map(Value::from),
                            Err(_) => row.try_get::<Option<i16>, _>(name)?.map(Value::from),
                        },
                    },
                    FieldType::Float => row.try_get::<Option<f64>, _>(name)?.map(Value::from),
                    FieldType::String => row.try_get::<Option<String>, _>(name)?.map(Value::from),
                    FieldType::Bool => row.try_get::<Option<bool>, _>(name)?.map(Value::from),
                };
                out.insert(column.name.clone(), value.unwrap_or(Value::Null));
            }
            Ok(out)
        }
    }

    #[async_trait]
    impl RowSource for PostgresSource {
        fn dialect(&self) -> Dialect {
            Dialect::Postgres
        }

        async fn fetch(&self, sql: &str, columns: &[OutputColumn]) -> QueryResult<Vec<Row>> {
            let rows = sqlx::query(sql).fetch_all(&self.pool).await?;
            rows.iter().map(|row| Self::decode(row, columns)).collect()
        }
    }
}
