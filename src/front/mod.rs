//! The hot-swappable request front.
//!
//! ```text
//!   rebuild(provider) ─▶ SchemaModel ─▶ TypeGraph ─▶ publish(Snapshot)
//!                                                        │
//!                                      watch<Option<Arc<Snapshot>>>
//!                                                        │
//!            handle(request) / subscribe(request) ◀──────┘
//!            (one load per request, held until it finishes)
//! ```
//!
//! A failed rebuild leaves the published snapshot untouched.

mod snapshot;

pub use snapshot::Snapshot;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{watch, Mutex};
use tracing::{error, info};

use crate::graph::GraphBuildError;
use crate::live::{LiveQueries, LiveQuery};
use crate::metadata::{IntrospectionProvider, MetadataError};
use crate::query::{QueryResult, Response, RowSource, Selection};
use crate::schema::{SchemaError, SchemaModel};

pub type FrontResult<T> = Result<T, FrontError>;

/// Errors that abort building a snapshot.
#[derive(Debug, Error)]
pub enum FrontError {
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("Type graph error: {0}")]
    Graph(#[from] GraphBuildError),

    #[error("Introspection error: {0}")]
    Metadata(#[from] MetadataError),
}

/// Serves requests against the latest published [`Snapshot`].
pub struct Front {
    current: watch::Sender<Option<Arc<Snapshot>>>,
    versions: AtomicU64,
    /// Held across a whole rebuild so the fingerprint check and the
    /// publish are not interleaved with another rebuild.
    rebuilding: Mutex<()>,
    source: Arc<dyn RowSource>,
    namespace: String,
    live: LiveQueries,
}

impl Front {
    /// A front with nothing published yet. Requests wait for the first
    /// publication.
    pub fn new(source: Arc<dyn RowSource>, namespace: &str, live: LiveQueries) -> Self {
        let (current, _) = watch::channel(None);
        Self {
            current,
            versions: AtomicU64::new(0),
            rebuilding: Mutex::new(()),
            source,
            namespace: namespace.to_string(),
            live,
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn live(&self) -> &LiveQueries {
        &self.live
    }

    /// Replace the current snapshot. In-flight requests keep the one they
    /// loaded.
    pub fn publish(&self, snapshot: Snapshot) -> Arc<Snapshot> {
        let version = self.versions.fetch_add(1, Ordering::SeqCst) + 1;
        let snapshot = Arc::new(snapshot.with_version(version));
        self.current.send_replace(Some(Arc::clone(&snapshot)));
        info!(
            version,
            fingerprint = snapshot.fingerprint(),
            tables = snapshot.schema().len(),
            "published snapshot"
        );
        snapshot
    }

    /// Build and publish a snapshot for `schema` using this front's source.
    pub fn publish_schema(&self, schema: SchemaModel) -> FrontResult<Arc<Snapshot>> {
        let snapshot = Snapshot::build(schema, Arc::clone(&self.source), &self.namespace)?;
        Ok(self.publish(snapshot))
    }

    /// The latest snapshot, if any has been published.
    pub fn current(&self) -> Option<Arc<Snapshot>> {
        self.current.borrow().clone()
    }

    /// The latest snapshot, waiting for the first publication.
    pub async fn snapshot(&self) -> Arc<Snapshot> {
        if let Some(snapshot) = self.current() {
            return snapshot;
        }

        let mut rx = self.current.subscribe();
        loop {
            let current = rx.borrow_and_update().clone();
            if let Some(snapshot) = current {
                return snapshot;
            }
            // `self` owns the sender, so the channel outlives this wait.
            let _ = rx.changed().await;
        }
    }

    /// Answer one request against a single snapshot.
    pub async fn handle(&self, selection: &Selection) -> Response {
        let snapshot = self.snapshot().await;
        match snapshot.prepare(selection) {
            Ok(executable) => Response::from_result(&selection.name, executable.run().await),
            Err(err) => Response::error(&err),
        }
    }

    /// Parse and answer a request in selection text form.
    pub async fn handle_text(&self, text: &str) -> Response {
        match Selection::parse(text) {
            Ok(selection) => self.handle(&selection).await,
            Err(err) => Response::error(&err),
        }
    }

    /// Register a live query. It keeps the snapshot current at this call
    /// even if the front is swapped later.
    pub async fn subscribe(&self, selection: &Selection) -> QueryResult<LiveQuery> {
        let snapshot = self.snapshot().await;
        let executable = snapshot.prepare(selection)?;
        Ok(self.live.subscribe(executable, snapshot.namespace()))
    }

    /// Re-introspect and publish if the schema changed.
    ///
    /// Returns the new snapshot, or `None` when the fingerprint matched the
    /// current one. On error nothing is published.
    pub async fn rebuild(
        &self,
        provider: &dyn IntrospectionProvider,
    ) -> FrontResult<Option<Arc<Snapshot>>> {
        let _guard = self.rebuilding.lock().await;
        let result = self.try_rebuild(provider).await;
        if let Err(err) = &result {
            error!(namespace = %self.namespace, error = %err, "rebuild failed, keeping current snapshot");
        }
        result
    }

    async fn try_rebuild(
        &self,
        provider: &dyn IntrospectionProvider,
    ) -> FrontResult<Option<Arc<Snapshot>>> {
        let tables = provider.introspect(&self.namespace).await?;
        let schema = SchemaModel::from_metadata(&tables)?;

        if let Some(current) = self.current() {
            if current.fingerprint() == schema.fingerprint() {
                info!(
                    version = current.version(),
                    fingerprint = schema.fingerprint(),
                    "schema unchanged, skipping publish"
                );
                return Ok(None);
            }
        }

        self.publish_schema(schema).map(Some)
    }
}

impl std::fmt::Debug for Front {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Front")
            .field("current", &self.current())
            .field("namespace", &self.namespace)
            .field("live_queries", &self.live.len())
            .finish()
    }
}
