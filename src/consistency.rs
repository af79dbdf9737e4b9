//! Replica consistency detection.
//!
//! Replicas of the same logical shard are expected to report the same object
//! count. [`check_consistency`] groups the normalized inventory by
//! `(collection, shard)` and reports every replica of each group whose counts
//! disagree, together with the affected collections.
//!
//! The check is a pure function over an inventory snapshot that the caller
//! already fetched.

use std::collections::{BTreeSet, HashMap};

use serde::Serialize;

use crate::models::{InconsistencyReport, NodeShardRecord, ShardGroupKey};

/// Outcome of a consistency check.
///
/// `Consistent` is distinct from an empty row list so callers can tell
/// "checked, nothing wrong" apart from "not checked yet".
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ConsistencyReport {
    Consistent,
    Inconsistent {
        /// Every replica of every inconsistent shard, in inventory order.
        rows: Vec<InconsistencyReport>,
        /// Affected collections, deduplicated, in first-seen order.
        collections: Vec<String>,
    },
}

impl ConsistencyReport {
    pub fn is_consistent(&self) -> bool {
        matches!(self, ConsistencyReport::Consistent)
    }

    /// Affected collections; empty when consistent.
    pub fn collections(&self) -> &[String] {
        match self {
            ConsistencyReport::Consistent => &[],
            ConsistencyReport::Inconsistent { collections, .. } => collections,
        }
    }

    pub fn rows(&self) -> &[InconsistencyReport] {
        match self {
            ConsistencyReport::Consistent => &[],
            ConsistencyReport::Inconsistent { rows, .. } => rows,
        }
    }

    /// Number of distinct inconsistent shards.
    pub fn shard_count(&self) -> usize {
        self.rows()
            .iter()
            .map(|r| (r.collection.as_str(), r.shard.as_str()))
            .collect::<BTreeSet<_>>()
            .len()
    }

    /// One-line message for operators.
    pub fn summary(&self) -> String {
        match self {
            ConsistencyReport::Consistent => "All shards are consistent.".to_string(),
            ConsistencyReport::Inconsistent { collections, .. } => format!(
                "Found {} inconsistent shard(s) across {} collection(s).",
                self.shard_count(),
                collections.len()
            ),
        }
    }
}

/// Group replicas by shard and flag groups whose object counts differ.
///
/// A shard seen on a single node has one distinct count and is therefore
/// never flagged.
pub fn check_consistency(records: &[NodeShardRecord]) -> ConsistencyReport {
    // Groups are kept in first-seen order so the output is deterministic.
    let mut index: HashMap<ShardGroupKey, usize> = HashMap::new();
    let mut groups: Vec<Vec<&NodeShardRecord>> = Vec::new();

    for record in records {
        let slot = *index.entry(record.group_key()).or_insert_with(|| {
            groups.push(Vec::new());
            groups.len() - 1
        });
        groups[slot].push(record);
    }

    let mut rows = Vec::new();
    let mut collections: Vec<String> = Vec::new();

    for members in &groups {
        let distinct: BTreeSet<u64> = members.iter().map(|r| r.object_count).collect();
        if distinct.len() <= 1 {
            continue;
        }
        for member in members {
            rows.push(InconsistencyReport {
                collection: member.collection.clone(),
                shard: member.shard.clone(),
                node: member.node.clone(),
                object_count: member.object_count,
            });
        }
    }

    for row in &rows {
        if !collections.contains(&row.collection) {
            collections.push(row.collection.clone());
        }
    }

    if rows.is_empty() {
        ConsistencyReport::Consistent
    } else {
        ConsistencyReport::Inconsistent { rows, collections }
    }
}
