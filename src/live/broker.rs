//! Change events consumed from an external message broker.
//!
//! # Architecture
//!
//! ```text
//! topic per table: <source>.<schema>.<table>
//!   |
//!   v
//! [TopicConsumer] --> BrokerMessage { topic, payload }
//!   |
//!   v
//! [decode] --> ChangeEvent (same shape the embedded feed produces)
//! ```
//!
//! Payloads are JSON change envelopes:
//!
//! ```json
//! { "op": "u", "source": { "name": "shop", "schema": "public", "table": "customers" } }
//! ```
//!
//! Empty payloads (delete tombstones) are skipped.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::error::{FeedError, FeedResult};
use super::event::{topic_name, ChangeEvent, ChangeOp, TableId, Topic};
use super::feed::ChangeSource;

/// A raw message as delivered by a broker client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

/// Minimal consumer interface a broker client has to provide.
#[async_trait]
pub trait TopicConsumer: Send + 'static {
    async fn subscribe(&mut self, topics: &[String]) -> FeedResult<()>;

    /// Next message, or `None` when the consumer is shut down.
    async fn poll(&mut self) -> FeedResult<Option<BrokerMessage>>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Envelope {
    op: ChangeOp,
    source: EnvelopeSource,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct EnvelopeSource {
    name: String,
    schema: String,
    table: String,
}

/// Decode one broker message.
///
/// Returns `Ok(None)` for tombstones. The payload has to name the same
/// table as the topic it arrived on.
pub fn decode(message: &BrokerMessage) -> FeedResult<Option<ChangeEvent>> {
    let topic: Topic = message.topic.parse()?;
    if message.payload.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }

    let envelope: Envelope = serde_json::from_slice(&message.payload)?;
    let event = ChangeEvent::new(
        &envelope.source.name,
        &envelope.source.schema,
        &envelope.source.table,
        envelope.op,
    );

    if event.source != topic.source || event.table != topic.table {
        return Err(FeedError::InvalidTopic(format!(
            "payload for {} arrived on {}",
            event.topic(),
            message.topic
        )));
    }
    Ok(Some(event))
}

/// Encode an event in the envelope `decode` reads.
pub fn encode(event: &ChangeEvent) -> BrokerMessage {
    let envelope = Envelope {
        op: event.op,
        source: EnvelopeSource {
            name: event.source.clone(),
            schema: event.table.schema.clone(),
            table: event.table.table.clone(),
        },
    };
    BrokerMessage {
        topic: event.topic(),
        payload: serde_json::to_vec(&envelope).unwrap_or_default(),
    }
}

/// A [`ChangeSource`] reading one topic per table from a broker.
pub struct BrokerSource<C> {
    consumer: C,
    topics: Vec<String>,
    subscribed: bool,
    name: String,
}

impl<C: TopicConsumer> BrokerSource<C> {
    pub fn new(consumer: C, source_name: &str, tables: &[TableId]) -> Self {
        Self {
            consumer,
            topics: tables.iter().map(|t| topic_name(source_name, t)).collect(),
            subscribed: false,
            name: format!("broker:{}", source_name),
        }
    }

    pub fn topics(&self) -> &[String] {
        &self.topics
    }
}

#[async_trait]
impl<C: TopicConsumer> ChangeSource for BrokerSource<C> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn next_event(&mut self) -> FeedResult<Option<ChangeEvent>> {
        if !self.subscribed {
            self.consumer.subscribe(&self.topics).await?;
            self.subscribed = true;
        }

        loop {
            let Some(message) = self.consumer.poll().await? else {
                return Ok(None);
            };
            if let Some(event) = decode(&message)? {
                return Ok(Some(event));
            }
        }
    }
}
