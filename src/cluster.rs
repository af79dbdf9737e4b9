//! Cluster API abstraction and the REST implementation.
//!
//! [`ClusterApi`] is the seam between the repair logic and the database: the
//! orchestrator and session only ever talk to the cluster through it, so
//! tests can substitute in-memory stubs.
//!
//! [`HttpClusterApi`] speaks the Weaviate REST API:
//!
//! | Operation | Request |
//! |-----------|---------|
//! | [`shard_inventory`](ClusterApi::shard_inventory) | `GET /v1/nodes?output=verbose` |
//! | [`list_object_ids`](ClusterApi::list_object_ids) | `GET /v1/objects?class=&limit=&offset=&consistency_level=` |
//! | [`read_with_consistency`](ClusterApi::read_with_consistency) | `GET /v1/objects/{class}/{id}?consistency_level=` |
//! | [`read_on_node`](ClusterApi::read_on_node) | `GET /v1/objects/{class}/{id}?node_name=&tenant=` |
//!
//! All requests carry `Authorization: Bearer <key>` when an API key is set.
//! Collection names and object ids are percent-encoded as single path
//! segments.

use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::Url;
use serde::Deserialize;
use tracing::debug;

use crate::config::ClusterConfig;
use crate::error::{RepairError, Result};
use crate::models::{
    ConsistencyLevel, IndexingStatus, NodeInventory, NodePresence, NodeStats, ReadOutcome,
    ShardInfo,
};

/// Operations the repair subsystem needs from the cluster.
#[async_trait]
pub trait ClusterApi: Send + Sync {
    /// Fetch the current shard inventory of every node.
    async fn shard_inventory(&self) -> Result<Vec<NodeInventory>>;

    /// Fetch one page of object identifiers of a collection.
    ///
    /// An empty page means the listing is exhausted. A short page does not.
    async fn list_object_ids(
        &self,
        collection: &str,
        limit: usize,
        offset: usize,
        consistency: ConsistencyLevel,
    ) -> Result<Vec<String>>;

    /// Read a single object with a consistency directive, forcing the cluster
    /// to reconcile its replicas. Never fails: transport errors are reported
    /// as [`ReadOutcome::Failed`] with no status.
    async fn read_with_consistency(
        &self,
        collection: &str,
        id: &str,
        consistency: ConsistencyLevel,
    ) -> ReadOutcome;

    /// Read a single object from one specific node.
    ///
    /// Multi-tenant collections only answer reads scoped to a `tenant`.
    async fn read_on_node(
        &self,
        collection: &str,
        id: &str,
        node: &str,
        tenant: Option<&str>,
    ) -> NodePresence;
}

// ============ Wire types ============

#[derive(Deserialize)]
struct NodesResponse {
    #[serde(default)]
    nodes: Vec<WireNode>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireNode {
    name: String,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    git_hash: Option<String>,
    #[serde(default)]
    stats: Option<WireNodeStats>,
    #[serde(default)]
    shards: Option<Vec<WireShard>>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct WireNodeStats {
    #[serde(default)]
    object_count: u64,
    #[serde(default)]
    shard_count: u64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireShard {
    name: String,
    class: String,
    #[serde(default)]
    object_count: u64,
    #[serde(default)]
    vector_indexing_status: Option<String>,
    #[serde(default)]
    vector_queue_length: u64,
    #[serde(default)]
    compressed: bool,
    #[serde(default)]
    loaded: Option<bool>,
}

#[derive(Deserialize)]
struct ObjectsResponse {
    #[serde(default)]
    objects: Option<Vec<WireObject>>,
}

#[derive(Deserialize)]
struct WireObject {
    id: String,
}

impl From<WireNode> for NodeInventory {
    fn from(node: WireNode) -> Self {
        let stats = node.stats.unwrap_or_default();
        NodeInventory {
            name: node.name,
            status: node.status,
            version: node.version,
            git_hash: node.git_hash,
            stats: NodeStats {
                object_count: stats.object_count,
                shard_count: stats.shard_count,
            },
            shards: node
                .shards
                .unwrap_or_default()
                .into_iter()
                .map(|s| ShardInfo {
                    collection: s.class,
                    name: s.name,
                    object_count: s.object_count,
                    indexing_status: IndexingStatus::from(
                        s.vector_indexing_status.unwrap_or_default(),
                    ),
                    vector_queue_length: s.vector_queue_length,
                    compressed: s.compressed,
                    loaded: s.loaded.unwrap_or(true),
                })
                .collect(),
        }
    }
}

// ============ HTTP implementation ============

/// [`ClusterApi`] over the cluster's REST endpoints.
///
/// Holds one `reqwest::Client` for its whole lifetime; connection pooling and
/// teardown are left to the client.
pub struct HttpClusterApi {
    client: reqwest::Client,
    base_url: Url,
    api_key: Option<String>,
}

impl HttpClusterApi {
    /// Build a client from the `[cluster]` config section.
    ///
    /// The API key is read from the environment variable named by
    /// `api_key_env`, if any.
    pub fn from_config(config: &ClusterConfig) -> anyhow::Result<Self> {
        let api_key = config.api_key()?;
        Self::new(&config.url, api_key, Duration::from_secs(config.timeout_secs))
    }

    pub fn new(base_url: &str, api_key: Option<String>, timeout: Duration) -> anyhow::Result<Self> {
        let base_url = Url::parse(base_url)
            .with_context(|| format!("Invalid cluster url: {}", base_url))?;
        anyhow::ensure!(
            !base_url.cannot_be_a_base(),
            "Invalid cluster url: {}",
            base_url
        );
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url,
            api_key,
        })
    }

    /// Append `segments` to the base URL, encoding each one.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn object_url(&self, collection: &str, id: &str) -> Url {
        self.endpoint(&["v1", "objects", collection, id])
    }

    fn get(&self, url: Url) -> reqwest::RequestBuilder {
        let req = self.client.get(url);
        match &self.api_key {
            Some(key) => req.bearer_auth(key),
            None => req,
        }
    }

    /// Send a request and return the response only if it succeeded.
    async fn send_ok(
        &self,
        req: reqwest::RequestBuilder,
        context: String,
    ) -> Result<reqwest::Response> {
        let resp = req.send().await.map_err(|source| RepairError::Connectivity {
            context: context.clone(),
            source,
        })?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(RepairError::Status {
                context,
                status: status.as_u16(),
                body,
            });
        }
        Ok(resp)
    }
}

#[async_trait]
impl ClusterApi for HttpClusterApi {
    async fn shard_inventory(&self) -> Result<Vec<NodeInventory>> {
        let context = "Failed to retrieve node and shard details".to_string();
        let req = self.get(self.endpoint(&["v1", "nodes"])).query(&[("output", "verbose")]);
        let resp = self.send_ok(req, context.clone()).await?;
        let body: NodesResponse = resp.json().await.map_err(|e| RepairError::Protocol {
            context,
            message: e.to_string(),
        })?;
        Ok(body.nodes.into_iter().map(NodeInventory::from).collect())
    }

    async fn list_object_ids(
        &self,
        collection: &str,
        limit: usize,
        offset: usize,
        consistency: ConsistencyLevel,
    ) -> Result<Vec<String>> {
        let context = format!("Error listing objects of '{}' at offset {}", collection, offset);
        let req = self.get(self.endpoint(&["v1", "objects"])).query(&[
            ("class", collection.to_string()),
            ("limit", limit.to_string()),
            ("offset", offset.to_string()),
            ("consistency_level", consistency.to_string()),
        ]);
        let resp = self.send_ok(req, context.clone()).await?;
        let body: ObjectsResponse = resp.json().await.map_err(|e| RepairError::Protocol {
            context,
            message: e.to_string(),
        })?;
        let ids: Vec<String> = body
            .objects
            .unwrap_or_default()
            .into_iter()
            .map(|o| o.id)
            .collect();
        debug!(collection, offset, page = ids.len(), "listed object page");
        Ok(ids)
    }

    async fn read_with_consistency(
        &self,
        collection: &str,
        id: &str,
        consistency: ConsistencyLevel,
    ) -> ReadOutcome {
        let req = self
            .get(self.object_url(collection, id))
            .query(&[("consistency_level", consistency.as_str())]);
        match req.send().await {
            Ok(resp) => {
                let status = resp.status().as_u16();
                if status == 200 || status == 404 {
                    return ReadOutcome::from_status(status, "");
                }
                let body = resp.text().await.unwrap_or_default();
                ReadOutcome::from_status(status, body)
            }
            Err(e) => ReadOutcome::Failed {
                status: None,
                message: e.to_string(),
            },
        }
    }

    async fn read_on_node(
        &self,
        collection: &str,
        id: &str,
        node: &str,
        tenant: Option<&str>,
    ) -> NodePresence {
        let mut query = vec![("node_name", node)];
        if let Some(tenant) = tenant {
            query.push(("tenant", tenant));
        }
        let req = self.get(self.object_url(collection, id)).query(&query);
        match req.send().await {
            Ok(resp) => NodePresence::from_status(resp.status().as_u16()),
            Err(_) => NodePresence::Error(None),
        }
    }
}
