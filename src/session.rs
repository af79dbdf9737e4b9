//! Operator session: the interface a host (CLI loop, HTTP dashboard) drives.
//!
//! A [`RepairSession`] combines the consistency check with the repair
//! orchestrator. The collections flagged by the most recent check become the
//! candidate set; a repair may only be started for one of them.
//!
//! ```rust,no_run
//! # use std::sync::Arc;
//! # use shard_repair::session::RepairSession;
//! # use shard_repair::repair::RepairSettings;
//! # async fn example(api: Arc<dyn shard_repair::cluster::ClusterApi>) -> anyhow::Result<()> {
//! let mut session = RepairSession::new(api, RepairSettings::default());
//! let report = session.check_consistency().await?;
//! if let Some(collection) = report.collections().first() {
//!     let handle = session.start_repair(collection).await?;
//!     loop {
//!         let update = session.continue_repair(handle.id).await?;
//!         for line in &update.log_delta {
//!             println!("{}", line);
//!         }
//!         if update.done {
//!             break;
//!         }
//!     }
//! }
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::cluster::ClusterApi;
use crate::consistency::{check_consistency, ConsistencyReport};
use crate::error::{RepairError, Result};
use crate::inventory::{
    node_names, node_summaries, normalize, readonly_shards, shard_counts_per_node,
};
use crate::models::{NodePresence, NodeShardCount, NodeShardRecord, NodeSummary};
use crate::repair::{BatchUpdate, JobHandle, RepairCounters, RepairOrchestrator, RepairSettings};

/// Snapshot of the active repair job.
#[derive(Debug, Clone, Serialize)]
pub struct JobStatus {
    pub handle: JobHandle,
    pub cursor: usize,
    pub total: usize,
    pub progress: f64,
    pub counters: RepairCounters,
    pub started_at: DateTime<Utc>,
}

/// Normalized inventory plus the derived shard views.
#[derive(Debug, Clone, Serialize)]
pub struct InventoryView {
    pub nodes: Vec<NodeSummary>,
    pub records: Vec<NodeShardRecord>,
    pub readonly: Vec<NodeShardRecord>,
    pub shard_counts: Vec<NodeShardCount>,
}

/// Presence of one object on one node.
#[derive(Debug, Clone, Serialize)]
pub struct NodeObjectPresence {
    pub node: String,
    pub presence: NodePresence,
}

pub struct RepairSession {
    api: Arc<dyn ClusterApi>,
    orchestrator: RepairOrchestrator,
    candidates: Option<Vec<String>>,
}

impl RepairSession {
    pub fn new(api: Arc<dyn ClusterApi>, settings: RepairSettings) -> Self {
        Self {
            orchestrator: RepairOrchestrator::new(api.clone(), settings),
            api,
            candidates: None,
        }
    }

    /// Fetch the inventory and check replica consistency.
    ///
    /// The affected collections replace the candidate set. An inventory
    /// failure leaves the previous candidate set untouched.
    pub async fn check_consistency(&mut self) -> Result<ConsistencyReport> {
        let nodes = self.api.shard_inventory().await?;
        let records = normalize(&nodes);
        let report = check_consistency(&records);
        info!(
            nodes = nodes.len(),
            replicas = records.len(),
            affected = report.collections().len(),
            "consistency check finished"
        );
        self.candidates = Some(report.collections().to_vec());
        Ok(report)
    }

    /// Collections eligible for repair, if a check has run.
    pub fn candidates(&self) -> Option<&[String]> {
        self.candidates.as_deref()
    }

    /// Start a repair of `collection`, discarding any job already running.
    ///
    /// The collection must be one of the candidates from the last
    /// consistency check; otherwise [`RepairError::InvalidSelection`] is
    /// returned without contacting the cluster.
    pub async fn start_repair(&mut self, collection: &str) -> Result<JobHandle> {
        let collection = collection.trim();
        if collection.is_empty() {
            return Err(RepairError::InvalidSelection(
                "no collection selected".to_string(),
            ));
        }
        match &self.candidates {
            None => {
                return Err(RepairError::InvalidSelection(
                    "run a consistency check before starting a repair".to_string(),
                ))
            }
            Some(candidates) if !candidates.iter().any(|c| c == collection) => {
                return Err(RepairError::InvalidSelection(format!(
                    "'{}' is not among the inconsistent collections",
                    collection
                )))
            }
            Some(_) => {}
        }

        let job = self.orchestrator.cancel_and_restart(collection).await?;
        Ok(job.handle())
    }

    /// Run the next batch of the job identified by `job_id`.
    pub async fn continue_repair(&mut self, job_id: Uuid) -> Result<BatchUpdate> {
        self.ensure_active(job_id)?;
        self.orchestrator.process_next_batch().await
    }

    /// Stop the job identified by `job_id`.
    ///
    /// Returns `Ok(false)` when no job is active, so repeated stops are
    /// harmless. A handle for a different job is rejected.
    pub fn stop_repair(&mut self, job_id: Uuid) -> Result<bool> {
        match self.orchestrator.active_job() {
            None => Ok(false),
            Some(job) if job.id() != job_id => Err(RepairError::StaleHandle(job_id)),
            Some(_) => Ok(self.orchestrator.stop_job()),
        }
    }

    pub fn status(&self) -> Option<JobStatus> {
        self.orchestrator.active_job().map(|job| JobStatus {
            handle: job.handle(),
            cursor: job.cursor(),
            total: job.total(),
            progress: job.progress(),
            counters: job.counters(),
            started_at: job.started_at(),
        })
    }

    /// Fetch the inventory and build the shard views.
    pub async fn inventory(&self) -> Result<InventoryView> {
        let nodes = self.api.shard_inventory().await?;
        let records = normalize(&nodes);
        let readonly = readonly_shards(&records).into_iter().cloned().collect();
        let shard_counts = shard_counts_per_node(&records);
        Ok(InventoryView {
            nodes: node_summaries(&nodes),
            records,
            readonly,
            shard_counts,
        })
    }

    /// Ask every node in the current inventory whether it serves the object.
    ///
    /// `tenant` scopes the lookup in multi-tenant collections. A blank tenant
    /// is treated as none.
    pub async fn locate_object(
        &self,
        collection: &str,
        object_id: &str,
        tenant: Option<&str>,
    ) -> Result<Vec<NodeObjectPresence>> {
        if collection.trim().is_empty() || object_id.trim().is_empty() {
            return Err(RepairError::InvalidSelection(
                "collection and object id are required".to_string(),
            ));
        }
        let tenant = tenant.map(str::trim).filter(|t| !t.is_empty());
        let nodes = self.api.shard_inventory().await?;
        let mut result = Vec::with_capacity(nodes.len());
        for node in node_names(&nodes) {
            let presence = self
                .api
                .read_on_node(collection, object_id, &node, tenant)
                .await;
            result.push(NodeObjectPresence { node, presence });
        }
        Ok(result)
    }

    fn ensure_active(&self, job_id: Uuid) -> Result<()> {
        match self.orchestrator.active_job() {
            None => Err(RepairError::NoActiveJob),
            Some(job) if job.id() != job_id => Err(RepairError::StaleHandle(job_id)),
            Some(_) => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::tests::{node, shard};
    use crate::models::ConsistencyLevel;
    use crate::repair::tests::StubCluster;

    fn inconsistent_inventory() -> Vec<crate::models::NodeInventory> {
        vec![
            node("node0", vec![shard("Article", "s1", 10), shard("Author", "s2", 4)]),
            node("node1", vec![shard("Article", "s1", 9), shard("Author", "s2", 4)]),
        ]
    }

    fn session(stub: Arc<StubCluster>) -> RepairSession {
        RepairSession::new(
            stub,
            RepairSettings {
                page_size: 100,
                batch_size: 4,
                consistency: ConsistencyLevel::All,
            },
        )
    }

    #[tokio::test]
    async fn test_start_requires_consistency_check() {
        let stub = Arc::new(StubCluster::with_pages(vec![5, 0]));
        let mut s = session(stub.clone());
        let err = s.start_repair("Article").await.unwrap_err();
        assert!(matches!(err, RepairError::InvalidSelection(_)));
        assert_eq!(stub.page_request_count(), 0);
    }

    #[tokio::test]
    async fn test_invalid_selection_rejected_before_network() {
        let mut stub = StubCluster::with_pages(vec![5, 0]);
        stub.inventory = inconsistent_inventory();
        let stub = Arc::new(stub);
        let mut s = session(stub.clone());

        let report = s.check_consistency().await.unwrap();
        assert_eq!(report.collections(), &["Article".to_string()]);
        assert_eq!(s.candidates(), Some(&["Article".to_string()][..]));

        assert!(matches!(
            s.start_repair("  ").await,
            Err(RepairError::InvalidSelection(_))
        ));
        assert!(matches!(
            s.start_repair("Author").await,
            Err(RepairError::InvalidSelection(_))
        ));
        assert_eq!(stub.page_request_count(), 0);
    }

    #[tokio::test]
    async fn test_full_repair_through_session() {
        let mut stub = StubCluster::with_pages(vec![10, 0]);
        stub.inventory = inconsistent_inventory();
        let stub = Arc::new(stub);
        let mut s = session(stub.clone());
        s.check_consistency().await.unwrap();

        let handle = s.start_repair("Article").await.unwrap();
        assert_eq!(handle.collection, "Article");
        assert_eq!(s.status().unwrap().total, 10);

        let mut calls = 0;
        let mut lines = Vec::new();
        loop {
            let update = s.continue_repair(handle.id).await.unwrap();
            calls += 1;
            lines.extend(update.log_delta);
            if update.done {
                assert_eq!(update.progress, 1.0);
                break;
            }
        }
        assert_eq!(calls, 3);
        assert_eq!(stub.read_count(), 10);
        assert!(lines.iter().any(|l| l == "10 objects found in 'Article'."));
        assert!(s.status().is_none());
        assert!(matches!(
            s.continue_repair(handle.id).await,
            Err(RepairError::NoActiveJob)
        ));
    }

    #[tokio::test]
    async fn test_restart_invalidates_old_handle() {
        let mut stub = StubCluster::with_pages(vec![10, 0, 10, 0]);
        stub.inventory = inconsistent_inventory();
        let stub = Arc::new(stub);
        let mut s = session(stub);
        s.check_consistency().await.unwrap();

        let first = s.start_repair("Article").await.unwrap();
        s.continue_repair(first.id).await.unwrap();
        let second = s.start_repair("Article").await.unwrap();
        assert_ne!(first.id, second.id);

        assert!(matches!(
            s.continue_repair(first.id).await,
            Err(RepairError::StaleHandle(id)) if id == first.id
        ));
        assert!(matches!(
            s.stop_repair(first.id),
            Err(RepairError::StaleHandle(_))
        ));

        let status = s.status().unwrap();
        assert_eq!(status.cursor, 0);
        assert_eq!(status.counters, RepairCounters::default());

        assert!(s.stop_repair(second.id).unwrap());
        assert!(!s.stop_repair(second.id).unwrap());
    }

    #[tokio::test]
    async fn test_locate_object_queries_each_node() {
        let mut stub = StubCluster::default();
        stub.inventory = inconsistent_inventory();
        let s = session(Arc::new(stub));
        let presence = s.locate_object("Article", "abc", None).await.unwrap();
        assert_eq!(presence.len(), 2);
        assert_eq!(presence[0].node, "node0");
        assert_eq!(presence[0].presence, NodePresence::Found);
        assert_eq!(presence[1].presence, NodePresence::Missing);
    }

    #[tokio::test]
    async fn test_locate_object_forwards_tenant() {
        let mut stub = StubCluster::default();
        stub.inventory = inconsistent_inventory();
        let stub = Arc::new(stub);
        let s = session(stub.clone());

        s.locate_object("Article", "abc", Some("tenantA")).await.unwrap();
        s.locate_object("Article", "abc", Some("  ")).await.unwrap();

        let reads = stub.node_reads.lock().unwrap().clone();
        assert_eq!(
            reads,
            vec![
                ("node0".to_string(), Some("tenantA".to_string())),
                ("node1".to_string(), Some("tenantA".to_string())),
                ("node0".to_string(), None),
                ("node1".to_string(), None),
            ]
        );
    }

    #[tokio::test]
    async fn test_inventory_view() {
        let mut stub = StubCluster::default();
        stub.inventory = inconsistent_inventory();
        let s = session(Arc::new(stub));
        let view = s.inventory().await.unwrap();
        assert_eq!(view.records.len(), 4);
        assert!(view.readonly.is_empty());
        assert_eq!(view.shard_counts.len(), 4);
        let names: Vec<&str> = view.nodes.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["node0", "node1"]);
    }
}
