//! In-process fake of the cluster REST API used by the integration tests.
//!
//! Serves `/v1/nodes` and `/v1/objects` on an ephemeral port with a fixed
//! inventory: `Article` shard `s1` disagrees between `weaviate-0` (10) and
//! `weaviate-1` (9), `Author` shard `s2` agrees (3/3) but is READONLY on
//! `weaviate-1`, and `weaviate-2` holds no shards.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use axum::{
    extract::{Path, Query, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListRequest {
    pub class: String,
    pub limit: usize,
    pub offset: usize,
    pub consistency: String,
}

pub struct FakeCluster {
    pub nodes: Value,
    pub ids: Vec<String>,
    pub missing: HashSet<String>,
    pub failing: HashSet<String>,
    /// Required bearer token, if any.
    pub token: Option<String>,
    /// Cap on returned page length regardless of `limit`.
    pub page_cap: Option<usize>,
    pub listings: Mutex<Vec<ListRequest>>,
    /// `(id, consistency_level)` of every consistency read.
    pub reads: Mutex<Vec<(String, String)>>,
    /// `(node_name, id, tenant)` of every per-node read.
    pub node_reads: Mutex<Vec<(String, String, Option<String>)>>,
}

pub fn object_id(n: usize) -> String {
    format!("00000000-0000-0000-0000-{:012}", n)
}

impl FakeCluster {
    /// Ten `Article` objects: #3 was deleted, #7 times out on read.
    pub fn inconsistent() -> Self {
        let ids: Vec<String> = (0..10).map(object_id).collect();
        Self {
            nodes: json!({
                "nodes": [
                    {"name": "weaviate-0", "status": "HEALTHY", "version": "1.25.4",
                     "gitHash": "a1b2c3d", "stats": {"objectCount": 13, "shardCount": 2},
                     "shards": [
                        {"name": "s1", "class": "Article", "objectCount": 10,
                         "vectorIndexingStatus": "READY", "loaded": true,
                         "vectorQueueLength": 7, "compressed": true},
                        {"name": "s2", "class": "Author", "objectCount": 3,
                         "vectorIndexingStatus": "READY", "loaded": true}
                    ]},
                    {"name": "weaviate-1", "status": "HEALTHY", "shards": [
                        {"name": "s1", "class": "Article", "objectCount": 9,
                         "vectorIndexingStatus": "READY", "loaded": true},
                        {"name": "s2", "class": "Author", "objectCount": 3,
                         "vectorIndexingStatus": "READONLY", "loaded": true}
                    ]},
                    {"name": "weaviate-2", "status": "UNHEALTHY", "shards": null}
                ]
            }),
            missing: HashSet::from([ids[3].clone()]),
            failing: HashSet::from([ids[7].clone()]),
            ids,
            token: None,
            page_cap: None,
            listings: Mutex::new(Vec::new()),
            reads: Mutex::new(Vec::new()),
            node_reads: Mutex::new(Vec::new()),
        }
    }

    pub fn consistent() -> Self {
        Self {
            nodes: json!({
                "nodes": [
                    {"name": "weaviate-0", "shards": [
                        {"name": "s1", "class": "Article", "objectCount": 5,
                         "vectorIndexingStatus": "READY", "loaded": true}
                    ]},
                    {"name": "weaviate-1", "shards": [
                        {"name": "s1", "class": "Article", "objectCount": 5,
                         "vectorIndexingStatus": "READY", "loaded": true}
                    ]}
                ]
            }),
            ..Self::inconsistent()
        }
    }

    pub fn with_token(mut self, token: &str) -> Self {
        self.token = Some(token.to_string());
        self
    }

    pub fn with_page_cap(mut self, cap: usize) -> Self {
        self.page_cap = Some(cap);
        self
    }

    fn authorized(&self, headers: &HeaderMap) -> bool {
        match &self.token {
            None => true,
            Some(token) => headers
                .get(AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .map(|v| v == format!("Bearer {}", token))
                .unwrap_or(false),
        }
    }
}

pub fn router(cluster: Arc<FakeCluster>) -> Router {
    Router::new()
        .route("/v1/nodes", get(nodes))
        .route("/v1/objects", get(list_objects))
        .route("/v1/objects/{class}/{id}", get(read_object))
        .with_state(cluster)
}

/// Serve `app` on an ephemeral port and return its base URL.
pub async fn spawn(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

pub async fn spawn_cluster(cluster: FakeCluster) -> (String, Arc<FakeCluster>) {
    let cluster = Arc::new(cluster);
    let url = spawn(router(cluster.clone())).await;
    (url, cluster)
}

pub fn find_free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

pub async fn wait_for_server(port: u16) {
    let client = reqwest::Client::new();
    let url = format!("http://127.0.0.1:{}/health", port);
    for _ in 0..50 {
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        if let Ok(resp) = client.get(&url).send().await {
            if resp.status().is_success() {
                return;
            }
        }
    }
    panic!("Server did not become ready within 5 seconds");
}

async fn nodes(State(cluster): State<Arc<FakeCluster>>, headers: HeaderMap) -> Response {
    if !cluster.authorized(&headers) {
        return (StatusCode::UNAUTHORIZED, "anonymous access not enabled").into_response();
    }
    Json(cluster.nodes.clone()).into_response()
}

async fn list_objects(
    State(cluster): State<Arc<FakeCluster>>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    if !cluster.authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let class = query.get("class").cloned().unwrap_or_default();
    let limit: usize = query
        .get("limit")
        .and_then(|v| v.parse().ok())
        .unwrap_or(25);
    let offset: usize = query
        .get("offset")
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);
    cluster.listings.lock().unwrap().push(ListRequest {
        class: class.clone(),
        limit,
        offset,
        consistency: query.get("consistency_level").cloned().unwrap_or_default(),
    });

    let take = cluster.page_cap.map_or(limit, |cap| cap.min(limit));
    let objects: Vec<Value> = cluster
        .ids
        .iter()
        .skip(offset)
        .take(take)
        .map(|id| json!({"id": id, "class": class}))
        .collect();
    let total = objects.len();
    Json(json!({"objects": objects, "totalResults": total})).into_response()
}

async fn read_object(
    State(cluster): State<Arc<FakeCluster>>,
    headers: HeaderMap,
    Path((class, id)): Path<(String, String)>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    if !cluster.authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let known = cluster.ids.contains(&id) && !cluster.missing.contains(&id);

    if let Some(node) = query.get("node_name") {
        cluster.node_reads.lock().unwrap().push((
            node.clone(),
            id.clone(),
            query.get("tenant").cloned(),
        ));
        return match node.as_str() {
            "weaviate-0" if known => Json(json!({"id": id, "class": class})).into_response(),
            "weaviate-0" | "weaviate-1" => StatusCode::NOT_FOUND.into_response(),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "unknown node").into_response(),
        };
    }

    let level = query.get("consistency_level").cloned().unwrap_or_default();
    cluster.reads.lock().unwrap().push((id.clone(), level));
    if cluster.failing.contains(&id) {
        return (StatusCode::INTERNAL_SERVER_ERROR, "replica timeout").into_response();
    }
    if !known {
        return StatusCode::NOT_FOUND.into_response();
    }
    Json(json!({"id": id, "class": class})).into_response()
}
