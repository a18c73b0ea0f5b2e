//! Live queries: re-run a compiled query whenever a table it reads changes.
//!
//! Each live query owns one consumer task holding a receiver of the shared
//! [`ChangeFeed`]. The task filters events against the query's touched
//! tables, refetches in full and pushes the new result. Dropping the
//! [`LiveQuery`] closes its delivery channel and the task exits.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::sync::{broadcast, mpsc};
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::query::{Executable, QueryError, ResponseError};

use super::broker::{BrokerSource, TopicConsumer};
use super::event::{ChangeEvent, TableId};
use super::feed::{embedded, ChangeFeed, EmbeddedEmitter};

/// Backoff for refetches failing on resource exhaustion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    /// First delay; doubled on every further attempt.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff: Duration::from_millis(250),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveConfig {
    /// Events buffered by the shared feed per receiver.
    pub channel_capacity: usize,
    pub subscriber_buffer: usize,
    pub coalesce_events: bool,
    pub retry: RetryPolicy,
    /// The `source` part of `source.schema.table` for attached sources.
    pub source_name: String,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 1024,
            subscriber_buffer: 16,
            coalesce_events: true,
            retry: RetryPolicy::default(),
            source_name: "rowgraph".to_string(),
        }
    }
}

/// One delivery to a live-query subscriber.
#[derive(Debug, Clone, PartialEq)]
pub enum LiveUpdate {
    /// The full current result.
    Data(Vec<Value>),
    /// A refetch failed; the subscription stays open.
    Error(ResponseError),
}

/// Subscriber end of a live query.
#[derive(Debug)]
pub struct LiveQuery {
    id: Uuid,
    root: String,
    updates: mpsc::Receiver<LiveUpdate>,
}

impl LiveQuery {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    /// Next delivery, or `None` once the live query has stopped.
    pub async fn next(&mut self) -> Option<LiveUpdate> {
        self.updates.recv().await
    }

    /// Next delivery if one is already queued.
    pub fn try_next(&mut self) -> Option<LiveUpdate> {
        self.updates.try_recv().ok()
    }
}

struct Entry {
    root: String,
    tables: HashSet<TableId>,
    abort: Option<AbortHandle>,
}

/// Registry of running live queries sharing one [`ChangeFeed`].
#[derive(Clone)]
pub struct LiveQueries {
    feed: ChangeFeed,
    config: LiveConfig,
    active: Arc<DashMap<Uuid, Entry>>,
}

impl LiveQueries {
    /// Create the registry and its feed, sized by `config.channel_capacity`.
    pub fn new(config: LiveConfig) -> Self {
        Self {
            feed: ChangeFeed::new(config.channel_capacity.max(1)),
            config,
            active: Arc::new(DashMap::new()),
        }
    }

    pub fn feed(&self) -> &ChangeFeed {
        &self.feed
    }

    pub fn config(&self) -> &LiveConfig {
        &self.config
    }

    /// Attach an in-process source named after `config.source_name`.
    ///
    /// The reader task ends once every clone of the emitter is dropped.
    pub fn attach_embedded(&self, buffer: usize) -> (EmbeddedEmitter, JoinHandle<()>) {
        let (emitter, source) = embedded(&self.config.source_name, buffer.max(1));
        (emitter, self.feed.attach(source))
    }

    /// Attach a broker consumer reading the `source_name.schema.table`
    /// topic of each of `tables`.
    pub fn attach_broker<C: TopicConsumer>(
        &self,
        consumer: C,
        tables: &[TableId],
    ) -> JoinHandle<()> {
        let source = BrokerSource::new(consumer, &self.config.source_name, tables);
        self.feed.attach(source)
    }

    /// Start a live query. The current result is delivered first, then a
    /// fresh one after every event for a touched table in `namespace`.
    pub fn subscribe(&self, executable: Executable, namespace: &str) -> LiveQuery {
        let id = Uuid::new_v4();
        let root = executable.root().to_string();
        let tables: HashSet<TableId> = executable
            .touched_tables()
            .iter()
            .map(|t| TableId::new(namespace, t))
            .collect();

        // Subscribe before the first fetch so no event in between is lost.
        let events = self.feed.subscribe();
        let (tx, rx) = mpsc::channel(self.config.subscriber_buffer.max(1));

        self.active.insert(
            id,
            Entry {
                root: root.clone(),
                tables: tables.clone(),
                abort: None,
            },
        );

        let worker = Worker {
            id,
            executable,
            tables,
            config: self.config.clone(),
        };
        let active = Arc::clone(&self.active);
        let handle = tokio::spawn(async move {
            worker.run(events, tx).await;
            active.remove(&id);
        });

        // The task may already be gone; then there is nothing to abort.
        if let Some(mut entry) = self.active.get_mut(&id) {
            entry.abort = Some(handle.abort_handle());
        }

        info!(%id, root = %root, "live query started");
        LiveQuery {
            id,
            root,
            updates: rx,
        }
    }

    /// Stop a live query regardless of whether its subscriber is still
    /// reading. Returns false if it had already stopped.
    pub fn cancel(&self, id: Uuid) -> bool {
        match self.active.remove(&id) {
            Some((_, entry)) => {
                if let Some(abort) = entry.abort {
                    abort.abort();
                }
                info!(%id, root = %entry.root, "live query cancelled");
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    pub fn is_active(&self, id: Uuid) -> bool {
        self.active.contains_key(&id)
    }

    /// Tables the live query `id` is watching.
    pub fn tables(&self, id: Uuid) -> Option<HashSet<TableId>> {
        self.active.get(&id).map(|e| e.tables.clone())
    }
}

struct Worker {
    id: Uuid,
    executable: Executable,
    tables: HashSet<TableId>,
    config: LiveConfig,
}

impl Worker {
    async fn run(self, mut events: broadcast::Receiver<ChangeEvent>, tx: mpsc::Sender<LiveUpdate>) {
        if !self.deliver(&tx).await {
            return;
        }

        loop {
            let refetch = tokio::select! {
                _ = tx.closed() => break,
                received = events.recv() => match received {
                    Ok(event) => self.matches(&event),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(id = %self.id, skipped, "live query lagged behind change feed, refetching");
                        true
                    }
                    Err(RecvError::Closed) => break,
                },
            };
            if !refetch {
                continue;
            }

            if self.config.coalesce_events {
                self.drain(&mut events);
            }
            if !self.deliver(&tx).await {
                break;
            }
        }
        debug!(id = %self.id, "live query stopped");
    }

    fn matches(&self, event: &ChangeEvent) -> bool {
        self.tables.contains(&event.table)
    }

    /// Discard events already queued; the coming refetch covers them.
    fn drain(&self, events: &mut broadcast::Receiver<ChangeEvent>) {
        loop {
            match events.try_recv() {
                Ok(_) | Err(TryRecvError::Lagged(_)) => continue,
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }
    }

    /// Refetch and push. Returns false once the subscriber is gone.
    async fn deliver(&self, tx: &mpsc::Sender<LiveUpdate>) -> bool {
        let update = match self.refetch().await {
            Ok(rows) => LiveUpdate::Data(rows),
            Err(err) => {
                warn!(id = %self.id, root = self.executable.root(), error = %err, "live query refetch failed");
                LiveUpdate::Error(ResponseError::from(&err))
            }
        };
        tx.send(update).await.is_ok()
    }

    async fn refetch(&self) -> Result<Vec<Value>, QueryError> {
        let retry = &self.config.retry;
        let mut delay = retry.backoff;
        let mut attempt = 0;
        loop {
            match self.executable.run().await {
                Err(err) if err.is_resource_exhaustion() && attempt < retry.max_retries => {
                    attempt += 1;
                    warn!(id = %self.id, attempt, delay_ms = delay.as_millis() as u64, "refetch exhausted resources, backing off");
                    tokio::time::sleep(delay).await;
                    delay = delay.saturating_mul(2);
                }
                result => return result,
            }
        }
    }
}
