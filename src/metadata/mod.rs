//! Database introspection.
//!
//! Providers report tables, columns and single-column foreign keys; the
//! schema builder turns those facts into a [`SchemaModel`](crate::schema::SchemaModel).
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │            IntrospectionProvider             │
//! │  - list_tables()                             │
//! │  - get_table()                               │
//! │  - get_tables_batch()   (join_all)           │
//! │  - introspect()                              │
//! └──────────────────────────────────────────────┘
//!        │                │                │
//!        ▼                ▼                ▼
//!  SqliteProvider  PostgresProvider  StaticProvider
//! ```

mod provider;
mod sqlite;
mod types;

#[cfg(feature = "postgres")]
mod postgres;

pub use provider::{IntrospectionProvider, MetadataError, MetadataResult, StaticProvider};
pub use sqlite::SqliteProvider;
pub use types::*;

#[cfg(feature = "postgres")]
pub use postgres::PostgresProvider;
