//! Core data models used throughout shard-repair.
//!
//! These types describe the cluster inventory as reported by the nodes API,
//! the normalized per-replica shard table, and the rows produced by the
//! consistency detector.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Vector indexing status of a shard replica.
///
/// Unknown values reported by newer servers are preserved verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum IndexingStatus {
    Ready,
    Indexing,
    ReadOnly,
    Other(String),
}

impl From<String> for IndexingStatus {
    fn from(value: String) -> Self {
        match value.to_ascii_uppercase().as_str() {
            "READY" => IndexingStatus::Ready,
            "INDEXING" => IndexingStatus::Indexing,
            "READONLY" => IndexingStatus::ReadOnly,
            _ => IndexingStatus::Other(value),
        }
    }
}

impl From<IndexingStatus> for String {
    fn from(value: IndexingStatus) -> Self {
        value.to_string()
    }
}

impl fmt::Display for IndexingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexingStatus::Ready => f.write_str("READY"),
            IndexingStatus::Indexing => f.write_str("INDEXING"),
            IndexingStatus::ReadOnly => f.write_str("READONLY"),
            IndexingStatus::Other(s) => f.write_str(s),
        }
    }
}

/// One shard replica as reported by a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardInfo {
    pub collection: String,
    pub name: String,
    pub object_count: u64,
    pub indexing_status: IndexingStatus,
    /// Vectors waiting to be indexed.
    pub vector_queue_length: u64,
    pub compressed: bool,
    pub loaded: bool,
}

/// Object and shard totals a node reports about itself.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct NodeStats {
    pub object_count: u64,
    pub shard_count: u64,
}

/// A cluster node and the shard replicas it holds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeInventory {
    pub name: String,
    pub status: Option<String>,
    pub version: Option<String>,
    pub git_hash: Option<String>,
    pub stats: NodeStats,
    pub shards: Vec<ShardInfo>,
}

/// Node-level row of the inventory view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeSummary {
    pub name: String,
    pub status: Option<String>,
    pub version: Option<String>,
    pub git_hash: Option<String>,
    pub stats: NodeStats,
}

/// One row of the normalized inventory: a single (node, shard) observation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeShardRecord {
    pub node: String,
    pub collection: String,
    pub shard: String,
    pub object_count: u64,
    pub indexing_status: IndexingStatus,
    pub vector_queue_length: u64,
    pub compressed: bool,
    pub loaded: bool,
}

impl NodeShardRecord {
    pub fn group_key(&self) -> ShardGroupKey {
        ShardGroupKey {
            collection: self.collection.clone(),
            shard: self.shard.clone(),
        }
    }
}

/// Identifies a logical shard independent of the node holding the replica.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShardGroupKey {
    pub collection: String,
    pub shard: String,
}

/// A replica row belonging to a shard whose object counts disagree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InconsistencyReport {
    pub collection: String,
    pub shard: String,
    pub node: String,
    pub object_count: u64,
}

/// Number of shards a node holds for one collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeShardCount {
    pub node: String,
    pub collection: String,
    pub shard_count: usize,
}

/// Consistency level directive sent with reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConsistencyLevel {
    One,
    Quorum,
    #[default]
    All,
}

impl ConsistencyLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConsistencyLevel::One => "ONE",
            ConsistencyLevel::Quorum => "QUORUM",
            ConsistencyLevel::All => "ALL",
        }
    }
}

impl fmt::Display for ConsistencyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a single consistency-forcing read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    Found,
    NotFound,
    /// Any other HTTP status, or no response at all (`status == None`).
    Failed {
        status: Option<u16>,
        message: String,
    },
}

impl ReadOutcome {
    /// Classify an HTTP status: 2xx is found, 404 is not found, anything else failed.
    pub fn from_status(status: u16, body: impl Into<String>) -> Self {
        match status {
            200..=299 => ReadOutcome::Found,
            404 => ReadOutcome::NotFound,
            _ => ReadOutcome::Failed {
                status: Some(status),
                message: body.into(),
            },
        }
    }
}

/// Whether a specific node serves a given object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "status", rename_all = "snake_case")]
pub enum NodePresence {
    Found,
    Missing,
    /// The node answered 500: it does not exist or cannot serve this shard.
    Unavailable,
    Error(Option<u16>),
}

impl NodePresence {
    pub fn from_status(status: u16) -> Self {
        match status {
            200..=299 => NodePresence::Found,
            404 => NodePresence::Missing,
            500 => NodePresence::Unavailable,
            other => NodePresence::Error(Some(other)),
        }
    }

    pub fn label(&self) -> String {
        match self {
            NodePresence::Found => "found".to_string(),
            NodePresence::Missing => "missing".to_string(),
            NodePresence::Unavailable => "n/a".to_string(),
            NodePresence::Error(Some(code)) => format!("error {}", code),
            NodePresence::Error(None) => "error".to_string(),
        }
    }
}
