use thiserror::Error;

pub type FeedResult<T> = Result<T, FeedError>;

/// Errors produced while reading change events.
#[derive(Debug, Error)]
pub enum FeedError {
    /// A broker payload could not be decoded into a change event.
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// A topic name not of the form `source.schema.table`, or one that
    /// disagrees with its payload.
    #[error("invalid topic: {0}")]
    InvalidTopic(String),

    /// The upstream event channel closed unexpectedly.
    #[error("channel closed")]
    ChannelClosed,
}

impl From<serde_json::Error> for FeedError {
    fn from(e: serde_json::Error) -> Self {
        Self::Deserialization(e.to_string())
    }
}
