//! # shard-repair
//!
//! Shard consistency detection and read-repair orchestration for replicated
//! vector database clusters.
//!
//! Replicas of a shard should report identical object counts. When they do
//! not, shard-repair identifies the affected collections and repairs them by
//! forcing a strongly consistent read of every object, which makes the
//! cluster reconcile the replicas it reads from.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌─────────────┐   ┌─────────────┐
//! │  Inventory  │──▶│ Consistency │──▶│   Repair    │──▶ consistency_level=ALL
//! │ (nodes API) │   │  detector   │   │ orchestrator│    reads, batch by batch
//! └─────────────┘   └─────────────┘   └──────┬──────┘
//!                                            │
//!                         ┌──────────────────┤
//!                         ▼                  ▼
//!                   ┌──────────┐       ┌──────────┐
//!                   │   CLI    │       │   HTTP   │
//!                   │  loop    │       │ dashboard│
//!                   └──────────┘       └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! shardrepair check                 # list inconsistent shards
//! shardrepair shards                # shard placement per node
//! shardrepair repair Article        # read-repair one collection
//! shardrepair serve                 # JSON API for a dashboard
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Inventory and report types |
//! | [`cluster`] | Cluster API trait and REST client |
//! | [`inventory`] | Inventory normalization and shard views |
//! | [`consistency`] | Replica count consistency check |
//! | [`repair`] | Resumable batched read-repair jobs |
//! | [`session`] | Host-facing check/start/continue/stop interface |
//! | [`driver`] | Foreground repair loop |
//! | [`progress`] | Progress reporting on stderr |
//! | [`server`] | Dashboard HTTP API |

pub mod cluster;
pub mod config;
pub mod consistency;
pub mod driver;
pub mod error;
pub mod inventory;
pub mod models;
pub mod progress;
pub mod repair;
pub mod server;
pub mod session;
