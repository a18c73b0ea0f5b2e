//! # rowgraph
//!
//! Serves a relational database as nested, relationship-following data
//! graphs, both as one-shot answers and as live queries refreshed by
//! change-data capture.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │             Database introspection (metadata)            │
//! │        tables, columns, single-column foreign keys       │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [schema builder]
//! ┌─────────────────────────────────────────────────────────┐
//! │                     Schema Model                         │
//! │       KeyDefinitions keyed by table/column names         │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [graph builder]
//! ┌─────────────────────────────────────────────────────────┐
//! │                      Type Graph                          │
//! │    scalars, referencing objects, referenced-by lists     │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [front: one Snapshot per request]
//! ┌─────────────────────────────────────────────────────────┐
//! │   Selection ─▶ component tree ─▶ SQL ─▶ rows ─▶ nested   │
//! │   CDC events ─▶ live queries ─▶ full refetch ─▶ push     │
//! └─────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod front;
pub mod graph;
pub mod live;
pub mod metadata;
pub mod query;
pub mod schema;
pub mod sql;

/// Re-exports for convenient usage.
pub mod prelude {
    pub use crate::config::Settings;
    pub use crate::front::{Front, FrontError, Snapshot};
    pub use crate::graph::{FieldKind, ObjectType, TypeGraph};
    pub use crate::live::{
        ChangeEvent, ChangeFeed, ChangeOp, LiveConfig, LiveQueries, LiveQuery, LiveUpdate,
        TableId,
    };
    pub use crate::metadata::{IntrospectionProvider, SqliteProvider, TableMetadata};
    pub use crate::query::{
        compile, CompiledQuery, Executable, QueryError, Response, RowSource, Selection,
        SqliteSource,
    };
    pub use crate::schema::{FieldType, KeyDefinition, QualifiedName, SchemaModel};
    pub use crate::sql::Dialect;
}

pub use front::{Front, Snapshot};
pub use query::{Response, Selection};
pub use schema::SchemaModel;
