//! Errors raised while building a schema model.

use super::key::FieldType;
use super::name::QualifiedName;

/// Result type for schema operations.
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Error type for schema construction.
///
/// Every variant aborts the build it occurs in. A failed rebuild never
/// touches a previously published model.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    #[error("Unsupported type '{native_type}' for column {table}.{column}")]
    UnsupportedType {
        table: String,
        column: String,
        native_type: String,
    },

    #[error("Table '{table}' declares more than one primary key: {}", columns.join(", "))]
    MultiplePrimaryKeys { table: String, columns: Vec<String> },

    #[error("Cannot merge key {name}: references {existing} and {incoming}")]
    InvalidForeignKeyMerge {
        name: QualifiedName,
        existing: QualifiedName,
        incoming: QualifiedName,
    },

    #[error("Cannot merge key {name}: field type {left} differs from {right}")]
    FieldTypeMismatch {
        name: QualifiedName,
        left: FieldType,
        right: FieldType,
    },

    #[error("Invalid qualified name: {0}")]
    InvalidName(String),

    #[error("Foreign key {from} references unknown column {to}")]
    UnknownForeignKeyTarget {
        from: QualifiedName,
        to: QualifiedName,
    },

    #[error("Failed to fingerprint schema: {0}")]
    Fingerprint(String),
}
