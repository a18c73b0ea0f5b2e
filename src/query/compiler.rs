//! Selection → component tree compiler.
//!
//! Walks a selection against a [`TypeGraph`], allocating a fresh alias for
//! every table visit:
//! - scalar → `Row` selecting `alias.column`
//! - singular reference → LEFT JOIN in the current statement, `Referencing`
//! - list reference → new batched statement, `Referenced`

use std::collections::BTreeSet;

use crate::graph::{FieldKind, ObjectType, TypeGraph};
use crate::schema::FieldType;
use crate::sql::{table_col, ExprExt, OrderByExpr, Query, ScalarCast, SelectExpr, TableRef};

use super::alias::AliasAllocator;
use super::component::{CompiledQuery, Component, KeyFilter, OutputColumn, Statement};
use super::error::{QueryError, QueryResult};
use super::selection::Selection;

/// Prefix marking synthetic fields that never resolve to columns.
pub const INTERNAL_PREFIX: &str = "__";

/// Compile a selection against one type graph snapshot.
pub fn compile(
    graph: &TypeGraph,
    selection: &Selection,
    namespace: Option<&str>,
) -> QueryResult<CompiledQuery> {
    Compiler::new(graph, namespace).compile(selection)
}

struct Compiler<'g> {
    graph: &'g TypeGraph,
    namespace: Option<&'g str>,
    aliases: AliasAllocator,
    touched: BTreeSet<String>,
}

impl<'g> Compiler<'g> {
    fn new(graph: &'g TypeGraph, namespace: Option<&'g str>) -> Self {
        Self {
            graph,
            namespace,
            aliases: AliasAllocator::new(),
            touched: BTreeSet::new(),
        }
    }

    fn compile(mut self, selection: &Selection) -> QueryResult<CompiledQuery> {
        let root = self
            .graph
            .object(&selection.name)
            .ok_or_else(|| QueryError::UnknownRoot(selection.name.clone()))?;
        require_nested(root, selection)?;

        let statement = self.statement(root, &selection.selection, None)?;

        Ok(CompiledQuery {
            root: selection.name.clone(),
            statement,
            touched: self.touched,
        })
    }

    /// Start a new statement rooted at `object`, optionally filtered on
    /// `filter_column` for batched sub-fetches.
    fn statement(
        &mut self,
        object: &'g ObjectType,
        fields: &[Selection],
        filter_column: Option<&str>,
    ) -> QueryResult<Statement> {
        let alias = self.aliases.next();
        self.touched.insert(object.name.clone());

        let mut builder = StatementBuilder::new(&object.name, &alias, self.table_ref(object, &alias));

        let filter = match filter_column {
            Some(column) => {
                let field_type = column_type(object, column)?;
                let output = builder.select(&alias, column, field_type);
                Some(KeyFilter {
                    alias: alias.clone(),
                    column: column.to_string(),
                    output,
                })
            }
            None => None,
        };

        let components = self.fields(&mut builder, object, &alias, fields)?;

        if let Some(pk) = &object.primary_key {
            builder.query = builder
                .query
                .order_by(vec![OrderByExpr::asc(table_col(&alias, pk))]);
        }

        Ok(builder.finish(components, filter))
    }

    fn fields(
        &mut self,
        builder: &mut StatementBuilder,
        object: &'g ObjectType,
        alias: &str,
        fields: &[Selection],
    ) -> QueryResult<Vec<Component>> {
        let mut components = Vec::with_capacity(fields.len());

        for selection in fields {
            if selection.name.starts_with(INTERNAL_PREFIX) {
                continue;
            }

            let field = object
                .field(&selection.name)
                .ok_or_else(|| QueryError::UnknownField {
                    object: object.name.clone(),
                    field: selection.name.clone(),
                })?;

            let component = match &field.kind {
                FieldKind::Scalar { column, field_type } => {
                    if !selection.is_leaf() {
                        return Err(QueryError::MalformedSelection(format!(
                            "scalar field '{}.{}' cannot have a sub-selection",
                            object.name, selection.name
                        )));
                    }
                    Component::Row {
                        field: selection.name.clone(),
                        column: builder.select(alias, column, *field_type),
                    }
                }

                FieldKind::SingularRef {
                    target,
                    local_key,
                    remote_key,
                } => {
                    let target = self.target(*target)?;
                    require_nested(target, selection)?;

                    let joined = self.aliases.next();
                    self.touched.insert(target.name.clone());
                    let on = table_col(alias, local_key).eq(table_col(&joined, remote_key));
                    builder.query = std::mem::take(&mut builder.query)
                        .left_join(self.table_ref(target, &joined), on);

                    let presence = builder.select(&joined, remote_key, column_type(target, remote_key)?);
                    let children = self.fields(builder, target, &joined, &selection.selection)?;
                    Component::Referencing {
                        field: selection.name.clone(),
                        presence,
                        children,
                    }
                }

                FieldKind::ListRef {
                    target,
                    local_key,
                    remote_key,
                } => {
                    let target = self.target(*target)?;
                    require_nested(target, selection)?;

                    let parent_key = builder.select(alias, local_key, column_type(object, local_key)?);
                    let statement = self.statement(target, &selection.selection, Some(remote_key))?;
                    let slot = builder.sub_fetches;
                    builder.sub_fetches += 1;
                    Component::Referenced {
                        field: selection.name.clone(),
                        parent_key,
                        slot,
                        statement: Box::new(statement),
                    }
                }
            };
            components.push(component);
        }

        Ok(components)
    }

    fn target(&self, id: crate::graph::TypeId) -> QueryResult<&'g ObjectType> {
        self.graph
            .object_by_id(id)
            .ok_or_else(|| QueryError::UnknownRoot(format!("type #{}", id.index())))
    }

    fn table_ref(&self, object: &ObjectType, alias: &str) -> TableRef {
        let table = TableRef::new(&object.name).with_alias(alias);
        match self.namespace {
            Some(schema) => table.with_schema(schema),
            None => table,
        }
    }
}

/// Accumulates the column list and joins of one statement.
struct StatementBuilder {
    table: String,
    alias: String,
    query: Query,
    columns: Vec<OutputColumn>,
    select: Vec<SelectExpr>,
    sub_fetches: usize,
}

impl StatementBuilder {
    fn new(table: &str, alias: &str, from: TableRef) -> Self {
        Self {
            table: table.into(),
            alias: alias.into(),
            query: Query::new().from(from),
            columns: vec![],
            select: vec![],
            sub_fetches: 0,
        }
    }

    /// Select `alias.column` once, returning its flattened output name.
    fn select(&mut self, alias: &str, column: &str, field_type: FieldType) -> String {
        let name = format!("{}_{}", alias, column);
        if !self.columns.iter().any(|c| c.name == name) {
            let mut expr = SelectExpr::new(table_col(alias, column));
            if let Some(cast) = decode_cast(field_type) {
                expr = expr.with_cast(cast);
            }
            self.select.push(expr.with_alias(&name));
            self.columns.push(OutputColumn {
                name: name.clone(),
                field_type,
            });
        }
        name
    }

    fn finish(self, components: Vec<Component>, filter: Option<KeyFilter>) -> Statement {
        let mut query = self.query;
        query.select = self.select;
        Statement {
            table: self.table,
            alias: self.alias,
            query,
            columns: self.columns,
            components,
            filter,
            sub_fetches: self.sub_fetches,
        }
    }
}

/// Float and string columns may come back as NUMERIC or UUID-like types
/// the driver only decodes after a conversion.
fn decode_cast(field_type: FieldType) -> Option<ScalarCast> {
    match field_type {
        FieldType::Float => Some(ScalarCast::Float),
        FieldType::String => Some(ScalarCast::Text),
        FieldType::Int | FieldType::Bool => None,
    }
}

fn require_nested(object: &ObjectType, selection: &Selection) -> QueryResult<()> {
    let has_fields = selection
        .selection
        .iter()
        .any(|s| !s.name.starts_with(INTERNAL_PREFIX));
    if has_fields {
        Ok(())
    } else {
        Err(QueryError::MalformedSelection(format!(
            "field '{}' of type '{}' needs a sub-selection",
            selection.name, object.name
        )))
    }
}

/// Field type of the scalar exposing `column` on `object`.
fn column_type(object: &ObjectType, column: &str) -> QueryResult<FieldType> {
    object
        .fields
        .values()
        .find_map(|f| match &f.kind {
            FieldKind::Scalar {
                column: c,
                field_type,
            } if c == column => Some(*field_type),
            _ => None,
        })
        .ok_or_else(|| QueryError::UnknownField {
            object: object.name.clone(),
            field: column.to_string(),
        })
}
