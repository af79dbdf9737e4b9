//! Inventory normalization.
//!
//! Flattens the nested node → shards inventory returned by the nodes API into
//! one [`NodeShardRecord`] per replica. The consistency detector and the
//! shard views both work on this flat table.

use crate::models::{
    IndexingStatus, NodeInventory, NodeShardCount, NodeShardRecord, NodeSummary,
};

/// Flatten a node inventory into per-replica records.
///
/// Output order is node order, then shard order within each node. No
/// filtering or aggregation is applied; an empty inventory yields an empty
/// table.
pub fn normalize(nodes: &[NodeInventory]) -> Vec<NodeShardRecord> {
    nodes
        .iter()
        .flat_map(|node| {
            node.shards.iter().map(move |shard| NodeShardRecord {
                node: node.name.clone(),
                collection: shard.collection.clone(),
                shard: shard.name.clone(),
                object_count: shard.object_count,
                indexing_status: shard.indexing_status.clone(),
                vector_queue_length: shard.vector_queue_length,
                compressed: shard.compressed,
                loaded: shard.loaded,
            })
        })
        .collect()
}

/// Replicas whose vector index is READONLY.
///
/// A read-only shard rejects writes, which is a frequent cause of replicas
/// drifting apart.
pub fn readonly_shards(records: &[NodeShardRecord]) -> Vec<&NodeShardRecord> {
    records
        .iter()
        .filter(|r| r.indexing_status == IndexingStatus::ReadOnly)
        .collect()
}

/// Count shards per (node, collection).
///
/// Rows follow node first-seen order, then collection first-seen order
/// within that node.
pub fn shard_counts_per_node(records: &[NodeShardRecord]) -> Vec<NodeShardCount> {
    let mut counts: Vec<NodeShardCount> = Vec::new();
    for record in records {
        match counts
            .iter_mut()
            .find(|c| c.node == record.node && c.collection == record.collection)
        {
            Some(existing) => existing.shard_count += 1,
            None => counts.push(NodeShardCount {
                node: record.node.clone(),
                collection: record.collection.clone(),
                shard_count: 1,
            }),
        }
    }

    // Group rows of the same node together while keeping first-seen order.
    let mut node_order: Vec<&str> = Vec::new();
    for record in records {
        if !node_order.contains(&record.node.as_str()) {
            node_order.push(&record.node);
        }
    }
    let mut ordered = Vec::with_capacity(counts.len());
    for node in node_order {
        ordered.extend(counts.iter().filter(|c| c.node == node).cloned());
    }
    ordered
}

/// Node-level rows: status, build and self-reported totals.
pub fn node_summaries(nodes: &[NodeInventory]) -> Vec<NodeSummary> {
    nodes
        .iter()
        .map(|node| NodeSummary {
            name: node.name.clone(),
            status: node.status.clone(),
            version: node.version.clone(),
            git_hash: node.git_hash.clone(),
            stats: node.stats,
        })
        .collect()
}

/// Distinct node names in first-seen order.
pub fn node_names(nodes: &[NodeInventory]) -> Vec<String> {
    let mut names: Vec<String> = Vec::with_capacity(nodes.len());
    for node in nodes {
        if !names.contains(&node.name) {
            names.push(node.name.clone());
        }
    }
    names
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::ShardInfo;

    pub(crate) fn shard(collection: &str, name: &str, count: u64) -> ShardInfo {
        ShardInfo {
            collection: collection.to_string(),
            name: name.to_string(),
            object_count: count,
            indexing_status: IndexingStatus::Ready,
            vector_queue_length: 0,
            compressed: false,
            loaded: true,
        }
    }

    pub(crate) fn node(name: &str, shards: Vec<ShardInfo>) -> NodeInventory {
        NodeInventory {
            name: name.to_string(),
            shards,
            ..Default::default()
        }
    }

    #[test]
    fn test_normalize_flattens_in_order() {
        let nodes = vec![
            node("n0", vec![shard("Article", "s1", 10), shard("Author", "s2", 3)]),
            node("n1", vec![shard("Article", "s1", 10)]),
        ];
        let records = normalize(&nodes);
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].node, "n0");
        assert_eq!(records[0].collection, "Article");
        assert_eq!(records[1].shard, "s2");
        assert_eq!(records[1].object_count, 3);
        assert_eq!(records[2].node, "n1");
        assert!(records.iter().all(|r| r.loaded));
    }

    #[test]
    fn test_normalize_empty_inputs() {
        assert!(normalize(&[]).is_empty());
        assert!(normalize(&[node("n0", vec![]), node("n1", vec![])]).is_empty());
    }

    #[test]
    fn test_readonly_filter() {
        let mut ro = shard("Article", "s1", 10);
        ro.indexing_status = IndexingStatus::ReadOnly;
        let nodes = vec![node("n0", vec![ro, shard("Article", "s2", 4)])];
        let records = normalize(&nodes);
        let readonly = readonly_shards(&records);
        assert_eq!(readonly.len(), 1);
        assert_eq!(readonly[0].shard, "s1");
    }

    #[test]
    fn test_shard_counts_per_node() {
        let nodes = vec![
            node(
                "n0",
                vec![
                    shard("Article", "s1", 1),
                    shard("Author", "s3", 1),
                    shard("Article", "s2", 1),
                ],
            ),
            node("n1", vec![shard("Article", "s1", 1)]),
        ];
        let counts = shard_counts_per_node(&normalize(&nodes));
        assert_eq!(
            counts,
            vec![
                NodeShardCount {
                    node: "n0".into(),
                    collection: "Article".into(),
                    shard_count: 2
                },
                NodeShardCount {
                    node: "n0".into(),
                    collection: "Author".into(),
                    shard_count: 1
                },
                NodeShardCount {
                    node: "n1".into(),
                    collection: "Article".into(),
                    shard_count: 1
                },
            ]
        );
    }

    #[test]
    fn test_node_names_dedup() {
        let nodes = vec![node("a", vec![]), node("b", vec![]), node("a", vec![])];
        assert_eq!(node_names(&nodes), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_node_summaries_carry_status_and_stats() {
        let mut n0 = node("n0", vec![shard("Article", "s1", 10)]);
        n0.status = Some("HEALTHY".into());
        n0.version = Some("1.25.4".into());
        n0.stats = crate::models::NodeStats {
            object_count: 10,
            shard_count: 1,
        };
        let summaries = node_summaries(&[n0, node("n1", vec![])]);
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].status.as_deref(), Some("HEALTHY"));
        assert_eq!(summaries[0].stats.object_count, 10);
        assert!(summaries[1].status.is_none());
    }

    #[test]
    fn test_normalize_keeps_queue_and_compression() {
        let mut s = shard("Article", "s1", 10);
        s.vector_queue_length = 42;
        s.compressed = true;
        let records = normalize(&[node("n0", vec![s])]);
        assert_eq!(records[0].vector_queue_length, 42);
        assert!(records[0].compressed);
    }
}
