//! Schema model built from database introspection.
//!
//! - [`name`] - `table/column` identities
//! - [`key`] - scalar field types and per-column key definitions
//! - [`model`] - the immutable model and its merging builder
//! - [`fingerprint`] - content hash used to detect schema changes

pub mod error;
pub mod fingerprint;
pub mod key;
pub mod model;
pub mod name;

pub use error::{SchemaError, SchemaResult};
pub use key::{FieldType, KeyDefinition};
pub use model::{SchemaModel, SchemaModelBuilder, TableModel};
pub use name::QualifiedName;
