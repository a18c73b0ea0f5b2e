//! Type graph construction from a schema model.
//!
//! Construction happens in two phases so that tables may reference each
//! other in any order:
//! - Phase 1: declare one object type per table
//! - Phase 2: resolve fields and relationship edges against those types

use crate::schema::{KeyDefinition, SchemaModel};

use super::{FieldKind, ObjectType, RelationEdge, TypeField, TypeGraph, TypeId};

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur during graph construction.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphBuildError {
    #[error("Field '{field}' is defined twice on type '{object}'")]
    DuplicateField { object: String, field: String },

    #[error("Type not found: {0}")]
    UnknownType(String),
}

pub type GraphBuildResult<T> = Result<T, GraphBuildError>;

/// Suffix of the raw scalar exposed next to a foreign-key traversal field.
pub const KEY_SUFFIX: &str = "_key";

/// Name of the list field on a target table for incoming key `table/column`.
pub fn inverse_field_name(table: &str, column: &str) -> String {
    format!("{}_on_{}", table, column)
}

// ============================================================================
// Construction Entry Point
// ============================================================================

impl TypeGraph {
    /// Derive the type graph for a schema model.
    pub fn from_schema(schema: &SchemaModel) -> GraphBuildResult<Self> {
        let mut graph = TypeGraph::new();

        // Phase 1: Declare all types
        for table in schema.tables() {
            let pk = table.primary_key().map(|k| k.name.column().to_string());
            let id = graph.graph.add_node(ObjectType::new(&table.name, pk));
            graph.type_index.insert(table.name.clone(), id);
        }

        // Phase 2: Fields and edges
        for table in schema.tables() {
            let owner = graph.require(&table.name)?;
            for key in table.columns.values() {
                graph.add_column_fields(owner, key)?;
            }
        }

        Ok(graph)
    }
}

// ============================================================================
// Phase 2: Field Creation
// ============================================================================

impl TypeGraph {
    fn require(&self, name: &str) -> GraphBuildResult<TypeId> {
        self.type_id(name)
            .ok_or_else(|| GraphBuildError::UnknownType(name.to_string()))
    }

    fn add_column_fields(&mut self, owner: TypeId, key: &KeyDefinition) -> GraphBuildResult<()> {
        let column = key.name.column();

        match &key.referencing {
            Some(target) => {
                // Raw key plus a traversal field, both from the same column.
                self.insert_field(
                    owner,
                    TypeField {
                        name: format!("{}{}", column, KEY_SUFFIX),
                        kind: FieldKind::Scalar {
                            column: column.to_string(),
                            field_type: key.field_type,
                        },
                        nullable: key.nullable,
                    },
                )?;

                let target_id = self.require(target.table())?;
                self.insert_field(
                    owner,
                    TypeField {
                        name: column.to_string(),
                        kind: FieldKind::SingularRef {
                            target: target_id,
                            local_key: column.to_string(),
                            remote_key: target.column().to_string(),
                        },
                        nullable: true,
                    },
                )?;
                self.graph.add_edge(
                    owner,
                    target_id,
                    RelationEdge {
                        field: column.to_string(),
                        many: false,
                    },
                );
            }
            None => {
                self.insert_field(
                    owner,
                    TypeField {
                        name: column.to_string(),
                        kind: FieldKind::Scalar {
                            column: column.to_string(),
                            field_type: key.field_type,
                        },
                        nullable: key.nullable,
                    },
                )?;
            }
        }

        for source in &key.referenced_by {
            let source_id = self.require(source.table())?;
            let name = inverse_field_name(source.table(), source.column());
            self.insert_field(
                owner,
                TypeField {
                    name: name.clone(),
                    kind: FieldKind::ListRef {
                        target: source_id,
                        local_key: column.to_string(),
                        remote_key: source.column().to_string(),
                    },
                    nullable: false,
                },
            )?;
            self.graph.add_edge(
                owner,
                source_id,
                RelationEdge {
                    field: name,
                    many: true,
                },
            );
        }

        Ok(())
    }

    fn insert_field(&mut self, owner: TypeId, field: TypeField) -> GraphBuildResult<()> {
        let object = &mut self.graph[owner];
        if object.fields.contains_key(&field.name) {
            return Err(GraphBuildError::DuplicateField {
                object: object.name.clone(),
                field: field.name,
            });
        }
        object.fields.insert(field.name.clone(), field);
        Ok(())
    }
}
