//! One immutable generation of served state.

use std::sync::Arc;

use crate::graph::TypeGraph;
use crate::query::{compile, Executable, QueryResult, RowSource, Selection};
use crate::schema::SchemaModel;
use crate::sql::Dialect;

use super::FrontResult;

/// Schema model, type graph and row source valid together.
///
/// Never mutated after publication; requests hold an `Arc<Snapshot>` for
/// as long as they run.
pub struct Snapshot {
    version: u64,
    schema: Arc<SchemaModel>,
    graph: Arc<TypeGraph>,
    namespace: String,
    source: Arc<dyn RowSource>,
}

impl Snapshot {
    /// Derive the type graph for `schema`. The version is assigned when
    /// the snapshot is published.
    pub fn build(
        schema: SchemaModel,
        source: Arc<dyn RowSource>,
        namespace: &str,
    ) -> FrontResult<Self> {
        let graph = TypeGraph::from_schema(&schema)?;
        Ok(Self {
            version: 0,
            schema: Arc::new(schema),
            graph: Arc::new(graph),
            namespace: namespace.to_string(),
            source,
        })
    }

    pub(super) fn with_version(mut self, version: u64) -> Self {
        self.version = version;
        self
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn fingerprint(&self) -> &str {
        self.schema.fingerprint()
    }

    pub fn schema(&self) -> &SchemaModel {
        &self.schema
    }

    pub fn graph(&self) -> &TypeGraph {
        &self.graph
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn dialect(&self) -> Dialect {
        self.source.dialect()
    }

    pub fn source(&self) -> &Arc<dyn RowSource> {
        &self.source
    }

    /// Compile `selection` against this snapshot's graph.
    pub fn prepare(&self, selection: &Selection) -> QueryResult<Executable> {
        let compiled = compile(&self.graph, selection, Some(&self.namespace))?;
        Ok(Executable::new(compiled, Arc::clone(&self.source)))
    }
}

impl std::fmt::Debug for Snapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Snapshot")
            .field("version", &self.version)
            .field("fingerprint", &self.fingerprint())
            .field("tables", &self.schema.len())
            .field("namespace", &self.namespace)
            .finish()
    }
}
