//! Queryable type graph derived from the schema model.
//!
//! One node per table, one edge per relationship field:
//! - singular edge: owner → referenced table (many-to-one)
//! - list edge: owner → referencing table (one-to-many)
//!
//! The graph is a pure projection of a [`SchemaModel`](crate::schema::SchemaModel)
//! and is rebuilt wholesale whenever the model changes.

mod builder;
pub mod types;

pub use builder::{inverse_field_name, GraphBuildError, GraphBuildResult, KEY_SUFFIX};
pub use types::*;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write;

use petgraph::graph::DiGraph;
use petgraph::visit::Bfs;

/// The queryable type graph.
#[derive(Debug, Clone)]
pub struct TypeGraph {
    graph: DiGraph<ObjectType, RelationEdge>,

    /// Index: table name → TypeId
    type_index: BTreeMap<String, TypeId>,
}

impl TypeGraph {
    fn new() -> Self {
        Self {
            graph: DiGraph::new(),
            type_index: BTreeMap::new(),
        }
    }

    pub fn type_id(&self, name: &str) -> Option<TypeId> {
        self.type_index.get(name).copied()
    }

    pub fn object(&self, name: &str) -> Option<&ObjectType> {
        self.type_id(name).and_then(|id| self.graph.node_weight(id))
    }

    pub fn object_by_id(&self, id: TypeId) -> Option<&ObjectType> {
        self.graph.node_weight(id)
    }

    pub fn type_names(&self) -> impl Iterator<Item = &str> {
        self.type_index.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Every table a traversal starting at `root` could ever reach.
    pub fn reachable_from(&self, root: &str) -> BTreeSet<String> {
        let mut reached = BTreeSet::new();
        let Some(start) = self.type_id(root) else {
            return reached;
        };

        let mut bfs = Bfs::new(&self.graph, start);
        while let Some(id) = bfs.next(&self.graph) {
            reached.insert(self.graph[id].name.clone());
        }
        reached
    }

    /// Render the graph as schema-definition text.
    pub fn to_sdl(&self) -> String {
        let mut out = String::new();
        for (i, id) in self.type_index.values().enumerate() {
            let object = &self.graph[*id];
            if i > 0 {
                out.push('\n');
            }
            let _ = writeln!(out, "type {} {{", object.name);
            for field in object.fields.values() {
                let _ = writeln!(out, "  {}: {}", field.name, self.render_field_type(field));
            }
            out.push_str("}\n");
        }
        out
    }

    fn render_field_type(&self, field: &TypeField) -> String {
        let target_name = |id: TypeId| {
            self.graph
                .node_weight(id)
                .map(|o| o.name.as_str())
                .unwrap_or("?")
        };

        let base = match &field.kind {
            FieldKind::Scalar { field_type, .. } => field_type.scalar_name().to_string(),
            FieldKind::SingularRef { target, .. } => target_name(*target).to_string(),
            FieldKind::ListRef { target, .. } => format!("[{}!]", target_name(*target)),
        };
        if field.nullable {
            base
        } else {
            format!("{}!", base)
        }
    }
}
