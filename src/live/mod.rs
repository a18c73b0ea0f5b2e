//! Live queries driven by change-data capture.
//!
//! ```text
//!   EmbeddedSource ─┐
//!                   ├─[reader task]─▶ ChangeFeed (broadcast)
//!   BrokerSource ───┘                      │
//!                        ┌─────────────────┼─────────────────┐
//!                        ▼                 ▼                 ▼
//!                   live query A      live query B      live query C
//!                  (filter, refetch, push full result)
//! ```

pub mod broker;
pub mod error;
pub mod event;
pub mod feed;
pub mod subscription;

pub use broker::{BrokerMessage, BrokerSource, TopicConsumer};
pub use error::{FeedError, FeedResult};
pub use event::{ChangeEvent, ChangeOp, TableId, Topic};
pub use feed::{embedded, ChangeFeed, ChangeSource, EmbeddedEmitter, EmbeddedSource};
pub use subscription::{LiveConfig, LiveQueries, LiveQuery, LiveUpdate, RetryPolicy};
