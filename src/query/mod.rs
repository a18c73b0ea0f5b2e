//! Nested selection → SQL → nested result.
//!
//! ```text
//!   Selection ──[compiler]──▶ CompiledQuery (component tree)
//!                                   │
//!                                   ▼ [executor]
//!                  root SELECT ──▶ rows ──▶ batched sub-fetches (concurrent)
//!                                   │
//!                                   ▼ [assemble]
//!                            nested JSON objects
//! ```

pub mod alias;
pub mod assemble;
pub mod compiler;
pub mod component;
pub mod error;
pub mod executor;
pub mod selection;

pub use alias::AliasAllocator;
pub use compiler::{compile, INTERNAL_PREFIX};
pub use component::{CompiledQuery, Component, KeyFilter, OutputColumn, Statement};
pub use error::{QueryError, QueryResult};
pub use executor::{execute, Executable, PoolConfig, RowSource, SqliteSource};
pub use selection::Selection;

#[cfg(feature = "postgres")]
pub use executor::PostgresSource;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A structured error as reported to protocol clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseError {
    pub message: String,
    pub kind: String,
}

impl From<&QueryError> for ResponseError {
    fn from(err: &QueryError) -> Self {
        Self {
            message: err.to_string(),
            kind: err.kind().to_string(),
        }
    }
}

/// Protocol response: `data` keyed by the root field, or `errors`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ResponseError>,
}

impl Response {
    pub fn ok(root: &str, rows: Vec<Value>) -> Self {
        let mut data = Map::new();
        data.insert(root.to_string(), Value::Array(rows));
        Self {
            data: Some(Value::Object(data)),
            errors: vec![],
        }
    }

    pub fn error(err: &QueryError) -> Self {
        Self {
            data: None,
            errors: vec![err.into()],
        }
    }

    pub fn from_result(root: &str, result: QueryResult<Vec<Value>>) -> Self {
        match result {
            Ok(rows) => Self::ok(root, rows),
            Err(err) => Self::error(&err),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    /// The rows under the root field, if the request succeeded.
    pub fn rows(&self, root: &str) -> Option<&Vec<Value>> {
        self.data.as_ref()?.get(root)?.as_array()
    }
}
