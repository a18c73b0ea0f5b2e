//! Column identity.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::SchemaError;

const SEPARATOR: char = '/';

/// A `(table, column)` pair, written `table/column`.
///
/// Both parts are non-empty and never contain the separator, so the string
/// form always parses back to the same pair.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct QualifiedName {
    table: String,
    column: String,
}

impl QualifiedName {
    pub fn new(table: impl Into<String>, column: impl Into<String>) -> Result<Self, SchemaError> {
        let table = table.into();
        let column = column.into();

        for part in [&table, &column] {
            if part.is_empty() {
                return Err(SchemaError::InvalidName(format!(
                    "empty part in '{}{}{}'",
                    table, SEPARATOR, column
                )));
            }
            if part.contains(SEPARATOR) {
                return Err(SchemaError::InvalidName(format!(
                    "'{}' contains '{}'",
                    part, SEPARATOR
                )));
            }
        }

        Ok(Self { table, column })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn column(&self) -> &str {
        &self.column
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.table, SEPARATOR, self.column)
    }
}

impl FromStr for QualifiedName {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split(SEPARATOR);
        match (parts.next(), parts.next(), parts.next()) {
            (Some(table), Some(column), None) => Self::new(table, column),
            _ => Err(SchemaError::InvalidName(format!(
                "expected exactly one '{}' in '{}'",
                SEPARATOR, s
            ))),
        }
    }
}

impl TryFrom<String> for QualifiedName {
    type Error = SchemaError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<QualifiedName> for String {
    fn from(name: QualifiedName) -> Self {
        name.to_string()
    }
}
