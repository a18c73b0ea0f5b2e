//! Type definitions for the queryable type graph.
//!
//! Each table becomes an [`ObjectType`]; each column and each side of a
//! foreign key becomes a [`TypeField`] tagged with its [`FieldKind`].

use std::collections::BTreeMap;

use petgraph::graph::NodeIndex;

use crate::schema::FieldType;

/// Handle to an object type inside a [`TypeGraph`](super::TypeGraph).
pub type TypeId = NodeIndex;

/// How a field is resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    /// A column copied straight from the row.
    Scalar { column: String, field_type: FieldType },

    /// Many-to-one: at most one `target` row where
    /// `target.remote_key = owner.local_key`.
    SingularRef {
        target: TypeId,
        local_key: String,
        remote_key: String,
    },

    /// One-to-many: every `target` row where
    /// `target.remote_key = owner.local_key`.
    ListRef {
        target: TypeId,
        local_key: String,
        remote_key: String,
    },
}

impl FieldKind {
    pub fn target(&self) -> Option<TypeId> {
        match self {
            FieldKind::Scalar { .. } => None,
            FieldKind::SingularRef { target, .. } | FieldKind::ListRef { target, .. } => {
                Some(*target)
            }
        }
    }
}

/// One field on an object type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeField {
    pub name: String,
    pub kind: FieldKind,
    /// Scalars follow the column; singular references are always nullable;
    /// lists are never null (possibly empty).
    pub nullable: bool,
}

/// One object type per table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectType {
    pub name: String,
    /// Column name of the table's primary key, if it has one.
    pub primary_key: Option<String>,
    pub fields: BTreeMap<String, TypeField>,
}

impl ObjectType {
    pub fn new(name: &str, primary_key: Option<String>) -> Self {
        Self {
            name: name.into(),
            primary_key,
            fields: BTreeMap::new(),
        }
    }

    pub fn field(&self, name: &str) -> Option<&TypeField> {
        self.fields.get(name)
    }
}

/// Edge weight: the field on the source type that leads to the target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationEdge {
    pub field: String,
    pub many: bool,
}
