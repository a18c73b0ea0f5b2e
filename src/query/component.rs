//! The component tree produced by compiling one selection.
//!
//! ```text
//! CompiledQuery
//!   └─ Statement (root table, one SELECT with LEFT JOINs)
//!        ├─ Row              scalar column from the current alias
//!        ├─ Referencing      joined object, children in the same SELECT
//!        │    └─ ...
//!        └─ Referenced       one-to-many, its own Statement run after the
//!             └─ Statement   parent rows are known (batched IN filter)
//! ```

use std::collections::BTreeSet;

use crate::schema::FieldType;
use crate::sql::{table_col, Dialect, ExprExt, Literal, Query};

/// A column in a statement's result set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputColumn {
    /// Flattened `alias_column` name, unique across aliases.
    pub name: String,
    pub field_type: FieldType,
}

/// One node of the component tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Component {
    /// Copy one column of the current row.
    Row { field: String, column: String },

    /// Nested object resolved through a join in the same statement.
    /// `presence` is the joined table's key column; null means no object.
    Referencing {
        field: String,
        presence: String,
        children: Vec<Component>,
    },

    /// List resolved by a separate statement keyed on the parent's column.
    Referenced {
        field: String,
        /// Column of the parent row holding the value children match on.
        parent_key: String,
        /// Index into the statement's sub-fetch results.
        slot: usize,
        statement: Box<Statement>,
    },
}

impl Component {
    pub fn field(&self) -> &str {
        match self {
            Component::Row { field, .. }
            | Component::Referencing { field, .. }
            | Component::Referenced { field, .. } => field,
        }
    }
}

/// Filter applied to a sub-fetch: `alias.column IN (parent values)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyFilter {
    pub alias: String,
    pub column: String,
    /// Output column carrying the matched value back for grouping.
    pub output: String,
}

/// One SELECT covering a root or a one-to-many edge plus every
/// many-to-one join below it.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub table: String,
    pub alias: String,
    /// Query without the key filter.
    pub query: Query,
    pub columns: Vec<OutputColumn>,
    pub components: Vec<Component>,
    pub filter: Option<KeyFilter>,
    /// Number of `Referenced` components anywhere in this statement's tree.
    pub sub_fetches: usize,
}

impl Statement {
    /// Render the SQL, restricted to `keys` when this is a sub-fetch.
    pub fn render(&self, dialect: Dialect, keys: &[Literal]) -> String {
        match &self.filter {
            Some(filter) => {
                let values = keys.iter().cloned().map(Into::into).collect();
                self.query
                    .clone()
                    .filter(table_col(&filter.alias, &filter.column).in_list(values))
                    .to_sql(dialect)
            }
            None => self.query.to_sql(dialect),
        }
    }

    /// Every `Referenced` component in this statement, including those
    /// nested under joined objects, ordered by slot.
    pub fn referenced(&self) -> Vec<&Component> {
        fn walk<'a>(components: &'a [Component], out: &mut Vec<&'a Component>) {
            for c in components {
                match c {
                    Component::Referencing { children, .. } => walk(children, out),
                    Component::Referenced { .. } => out.push(c),
                    Component::Row { .. } => {}
                }
            }
        }
        let mut out = Vec::new();
        walk(&self.components, &mut out);
        out.sort_by_key(|c| match c {
            Component::Referenced { slot, .. } => *slot,
            _ => usize::MAX,
        });
        out
    }
}

/// The executable root of one request.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    /// Top-level field name, which is also the root table.
    pub root: String,
    pub statement: Statement,
    /// Every physical table the query reads.
    pub touched: BTreeSet<String>,
}

impl CompiledQuery {
    /// Render every statement, root first. Sub-fetch filters are shown
    /// with a single `NULL` placeholder key.
    pub fn explain(&self, dialect: Dialect) -> Vec<String> {
        fn walk(stmt: &Statement, dialect: Dialect, out: &mut Vec<String>) {
            let placeholder = match stmt.filter {
                Some(_) => vec![Literal::Null],
                None => vec![],
            };
            out.push(stmt.render(dialect, &placeholder));
            for c in stmt.referenced() {
                if let Component::Referenced { statement, .. } = c {
                    walk(statement, dialect, out);
                }
            }
        }
        let mut out = Vec::new();
        walk(&self.statement, dialect, &mut out);
        out
    }
}
