//! Change events as reported by change-data capture.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::FeedError;

/// Kind of row change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeOp {
    #[serde(rename = "c")]
    Create,
    #[serde(rename = "u")]
    Update,
    #[serde(rename = "d")]
    Delete,
    /// Snapshot read of an existing row.
    #[serde(rename = "r")]
    Read,
}

impl ChangeOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "c",
            Self::Update => "u",
            Self::Delete => "d",
            Self::Read => "r",
        }
    }
}

/// `schema.table`, the part of an event live queries match on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableId {
    pub schema: String,
    pub table: String,
}

impl TableId {
    pub fn new(schema: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            table: table.into(),
        }
    }
}

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.table)
    }
}

/// One change reported for one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    /// Logical source name.
    pub source: String,
    pub table: TableId,
    pub op: ChangeOp,
}

impl ChangeEvent {
    pub fn new(source: &str, schema: &str, table: &str, op: ChangeOp) -> Self {
        Self {
            source: source.into(),
            table: TableId::new(schema, table),
            op,
        }
    }

    /// The `source.schema.table` name this event is published under.
    pub fn topic(&self) -> String {
        topic_name(&self.source, &self.table)
    }
}

impl fmt::Display for ChangeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.topic(), self.op.as_str())
    }
}

/// Parsed `source.schema.table` name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topic {
    pub source: String,
    pub table: TableId,
}

impl FromStr for Topic {
    type Err = FeedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('.').collect();
        match parts.as_slice() {
            [source, schema, table]
                if !source.is_empty() && !schema.is_empty() && !table.is_empty() =>
            {
                Ok(Topic {
                    source: source.to_string(),
                    table: TableId::new(*schema, *table),
                })
            }
            _ => Err(FeedError::InvalidTopic(s.to_string())),
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&topic_name(&self.source, &self.table))
    }
}

pub fn topic_name(source: &str, table: &TableId) -> String {
    format!("{}.{}", source, table)
}
