//! The shared change-event broadcast.
//!
//! One reader task per upstream source drains events into a single
//! `tokio::broadcast` channel. Every live query holds its own receiver,
//! so adding a live query never opens another upstream subscription.

use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::error::{FeedError, FeedResult};
use super::event::{ChangeEvent, ChangeOp};

/// An upstream supplier of change events.
#[async_trait]
pub trait ChangeSource: Send + 'static {
    /// Human-readable name for logs.
    fn name(&self) -> &str;

    /// Next event, or `None` once the source is exhausted.
    ///
    /// A `Deserialization` or `InvalidTopic` error skips one message;
    /// `ChannelClosed` stops the reader.
    async fn next_event(&mut self) -> FeedResult<Option<ChangeEvent>>;
}

/// Fan-out point for change events.
///
/// Cheap to clone (inner Arc via broadcast::Sender).
#[derive(Debug, Clone)]
pub struct ChangeFeed {
    tx: broadcast::Sender<ChangeEvent>,
}

impl ChangeFeed {
    /// Create a feed buffering up to `capacity` events per receiver.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publish an event to every receiver. Returns how many saw it.
    pub fn publish(&self, event: ChangeEvent) -> usize {
        // An error only means nobody is listening.
        self.tx.send(event).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.tx.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Spawn the reader task draining `source` into this feed.
    pub fn attach<S: ChangeSource>(&self, mut source: S) -> JoinHandle<()> {
        let feed = self.clone();
        tokio::spawn(async move {
            info!(source = source.name(), "change feed reader started");
            loop {
                match source.next_event().await {
                    Ok(Some(event)) => {
                        debug!(topic = %event.topic(), op = event.op.as_str(), "change event");
                        feed.publish(event);
                    }
                    Ok(None) => break,
                    Err(FeedError::ChannelClosed) => {
                        warn!(source = source.name(), "change source closed unexpectedly");
                        break;
                    }
                    Err(e) => {
                        warn!(source = source.name(), error = %e, "skipping undecodable change event");
                    }
                }
            }
            info!(source = source.name(), "change feed reader stopped");
        })
    }
}

// =============================================================================
// Embedded source
// =============================================================================

/// Create a connected in-process emitter and source pair.
///
/// Writers in the same process report changes through the emitter; the
/// source ends once every emitter is dropped.
pub fn embedded(source_name: &str, buffer: usize) -> (EmbeddedEmitter, EmbeddedSource) {
    let (tx, rx) = mpsc::channel(buffer);
    (
        EmbeddedEmitter {
            source: source_name.to_string(),
            tx,
        },
        EmbeddedSource {
            name: format!("embedded:{}", source_name),
            rx,
        },
    )
}

/// Write side of an embedded feed.
#[derive(Debug, Clone)]
pub struct EmbeddedEmitter {
    source: String,
    tx: mpsc::Sender<ChangeEvent>,
}

impl EmbeddedEmitter {
    pub async fn emit(&self, schema: &str, table: &str, op: ChangeOp) -> FeedResult<()> {
        self.tx
            .send(ChangeEvent::new(&self.source, schema, table, op))
            .await
            .map_err(|_| FeedError::ChannelClosed)
    }
}

/// Read side of an embedded feed.
#[derive(Debug)]
pub struct EmbeddedSource {
    name: String,
    rx: mpsc::Receiver<ChangeEvent>,
}

#[async_trait]
impl ChangeSource for EmbeddedSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn next_event(&mut self) -> FeedResult<Option<ChangeEvent>> {
        Ok(self.rx.recv().await)
    }
}
