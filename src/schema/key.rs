//! Per-column key definitions and scalar types.

use std::collections::BTreeSet;
use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::error::{SchemaError, SchemaResult};
use super::name::QualifiedName;

/// The scalar types a column may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FieldType {
    Int,
    Float,
    String,
    Bool,
}

/// Strips length/precision parameters: `VARCHAR(255)` -> `VARCHAR`.
static TYPE_PARAMS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*\([^)]*\)").unwrap());

/// Declared-type affinity rules, matched against the leading word of the
/// upper-cased type name. Trailing modifiers such as `UNSIGNED` are ignored.
static AFFINITY: Lazy<Vec<(Regex, FieldType)>> = Lazy::new(|| {
    [
        (r"^(TINY|SMALL|MEDIUM|BIG)?INT(EGER)?\d*$", FieldType::Int),
        (r"^(SMALL|BIG)?SERIAL\d*$", FieldType::Int),
        (r"^(REAL|FLOAT\w*|DOUBLE\w*|NUMERIC|DECIMAL)$", FieldType::Float),
        (r"^(N?(VAR)?CHAR\w*|VARYING|TEXT|CLOB|UUID)$", FieldType::String),
        (r"^BOOL\w*$", FieldType::Bool),
    ]
    .into_iter()
    .map(|(pattern, field_type)| (Regex::new(pattern).unwrap(), field_type))
    .collect()
});

impl FieldType {
    /// Map a native database type name onto a field type.
    ///
    /// Returns `None` for anything outside the four supported scalars.
    pub fn from_native(native_type: &str) -> Option<Self> {
        let upper = native_type.trim().to_uppercase();
        let base = TYPE_PARAMS.replace_all(&upper, "");
        let leading = base.split_whitespace().next()?;

        AFFINITY
            .iter()
            .find(|(pattern, _)| pattern.is_match(leading))
            .map(|(_, field_type)| *field_type)
    }

    /// Name used in printed type definitions.
    pub fn scalar_name(&self) -> &'static str {
        match self {
            FieldType::Int => "Int",
            FieldType::Float => "Float",
            FieldType::String => "String",
            FieldType::Bool => "Boolean",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FieldType::Int => "INT",
            FieldType::Float => "FLOAT",
            FieldType::String => "STRING",
            FieldType::Bool => "BOOL",
        };
        f.write_str(s)
    }
}

/// Everything the schema knows about one column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyDefinition {
    pub name: QualifiedName,
    pub field_type: FieldType,
    pub nullable: bool,
    pub primary_key: bool,
    /// The primary key this column points at, when it is a foreign key.
    pub referencing: Option<QualifiedName>,
    /// Foreign-key columns pointing at this column.
    pub referenced_by: BTreeSet<QualifiedName>,
    /// False for placeholders created from the far side of a foreign key
    /// before the target column itself has been ingested.
    #[serde(skip)]
    pub declared: bool,
}

impl KeyDefinition {
    pub fn new(name: QualifiedName, field_type: FieldType) -> Self {
        Self {
            name,
            field_type,
            nullable: true,
            primary_key: false,
            referencing: None,
            referenced_by: BTreeSet::new(),
            declared: true,
        }
    }

    pub fn with_nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    pub fn with_primary_key(mut self, primary_key: bool) -> Self {
        self.primary_key = primary_key;
        self
    }

    pub fn with_referencing(mut self, target: QualifiedName) -> Self {
        self.referencing = Some(target);
        self
    }

    pub fn with_referenced_by(mut self, source: QualifiedName) -> Self {
        self.referenced_by.insert(source);
        self
    }

    pub(crate) fn placeholder(name: QualifiedName, field_type: FieldType) -> Self {
        Self {
            declared: false,
            ..Self::new(name, field_type)
        }
    }

    pub fn is_foreign_key(&self) -> bool {
        self.referencing.is_some()
    }

    /// Combine two definitions of the same column.
    ///
    /// Fails when the field types differ or both sides point at different
    /// targets. Otherwise the set `referencing` wins and `referenced_by` is
    /// the union of both sides.
    pub fn merge(self, other: KeyDefinition) -> SchemaResult<KeyDefinition> {
        if self.name != other.name {
            return Err(SchemaError::InvalidName(format!(
                "cannot merge {} with {}",
                self.name, other.name
            )));
        }

        if self.field_type != other.field_type {
            return Err(SchemaError::FieldTypeMismatch {
                name: self.name,
                left: self.field_type,
                right: other.field_type,
            });
        }

        let referencing = match (self.referencing, other.referencing) {
            (Some(existing), Some(incoming)) if existing != incoming => {
                return Err(SchemaError::InvalidForeignKeyMerge {
                    name: self.name,
                    existing,
                    incoming,
                });
            }
            (Some(target), _) | (None, Some(target)) => Some(target),
            (None, None) => None,
        };

        let mut referenced_by = self.referenced_by;
        referenced_by.extend(other.referenced_by);

        // Placeholders carry no column facts of their own.
        let (nullable, primary_key) = match (self.declared, other.declared) {
            (true, false) => (self.nullable, self.primary_key),
            (false, true) => (other.nullable, other.primary_key),
            _ => (
                self.nullable && other.nullable,
                self.primary_key || other.primary_key,
            ),
        };

        Ok(KeyDefinition {
            name: self.name,
            field_type: self.field_type,
            nullable,
            primary_key,
            referencing,
            referenced_by,
            declared: self.declared || other.declared,
        })
    }
}
