//! Read-repair orchestration.
//!
//! A repair forces a strongly consistent read of every object in a
//! collection; the cluster reconciles diverging replicas as a side effect of
//! serving each read. The work is split so a host can drive it in small,
//! resumable steps:
//!
//! 1. [`RepairOrchestrator::start_job`] enumerates every object id of the
//!    collection (paginated, `consistency_level` on each page) and stores the
//!    resulting [`RepairJob`] in the orchestrator's single job slot.
//! 2. [`RepairOrchestrator::process_next_batch`] reads the next `batch_size`
//!    objects, appends one log line per object, and returns control.
//! 3. The host repeats step 2 until [`BatchUpdate::done`], or calls
//!    [`RepairOrchestrator::stop_job`] to discard the job.
//!
//! Per-object read failures are logged and counted; they never abort the
//! job. Only a failed enumeration aborts `start_job`, in which case no job is
//! created. Each run makes exactly one pass over the enumerated ids.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::cluster::ClusterApi;
use crate::config::RepairConfig;
use crate::error::{RepairError, Result};
use crate::models::{ConsistencyLevel, ReadOutcome};

/// Tunables for enumeration and batching.
#[derive(Debug, Clone)]
pub struct RepairSettings {
    /// Objects requested per listing page.
    pub page_size: usize,
    /// Objects read per [`RepairOrchestrator::process_next_batch`] call.
    pub batch_size: usize,
    /// Directive sent with listing pages and repair reads.
    pub consistency: ConsistencyLevel,
}

impl Default for RepairSettings {
    fn default() -> Self {
        Self::from(&RepairConfig::default())
    }
}

impl From<&RepairConfig> for RepairSettings {
    fn from(config: &RepairConfig) -> Self {
        Self {
            page_size: config.page_size.max(1),
            batch_size: config.batch_size.max(1),
            consistency: config.consistency,
        }
    }
}

/// Identifies a repair job to the host driver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobHandle {
    pub id: Uuid,
    pub collection: String,
}

/// Outcome tallies for a repair job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RepairCounters {
    pub found: u64,
    pub not_found: u64,
    pub failed: u64,
}

/// What one batch invocation produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchUpdate {
    /// Log lines appended since the previous update.
    pub log_delta: Vec<String>,
    /// `processed / total`, in `[0.0, 1.0]`.
    pub progress: f64,
    pub processed: usize,
    pub total: usize,
    pub done: bool,
}

/// Page through the listing endpoint until it returns an empty page.
///
/// A page shorter than `page_size` is not treated as the end: the endpoint
/// does not promise that, so one more request confirms exhaustion. The
/// offset advances by the ids actually returned, so a server that caps page
/// length below `page_size` does not cause ids to be skipped.
pub async fn enumerate_object_ids(
    api: &dyn ClusterApi,
    collection: &str,
    page_size: usize,
    consistency: ConsistencyLevel,
) -> Result<Vec<String>> {
    let mut ids = Vec::new();
    let mut offset = 0usize;

    loop {
        let page = api
            .list_object_ids(collection, page_size, offset, consistency)
            .await?;
        if page.is_empty() {
            break;
        }
        offset += page.len();
        ids.extend(page);
    }

    Ok(ids)
}

/// State of one repair run.
#[derive(Debug, Clone)]
pub struct RepairJob {
    id: Uuid,
    collection: String,
    ids: Vec<String>,
    cursor: usize,
    batch_size: usize,
    consistency: ConsistencyLevel,
    log: Vec<String>,
    /// Number of log lines already handed out in a [`BatchUpdate`].
    delivered: usize,
    counters: RepairCounters,
    started_at: DateTime<Utc>,
    summarized: bool,
}

impl RepairJob {
    /// Create a job over an already enumerated id list.
    pub fn new(
        collection: impl Into<String>,
        ids: Vec<String>,
        batch_size: usize,
        consistency: ConsistencyLevel,
    ) -> Self {
        let collection = collection.into();
        let mut log = vec![
            format!("Fetching objects for '{}'...", collection),
            format!("{} objects found in '{}'.", ids.len(), collection),
        ];
        if !ids.is_empty() {
            log.push(format!(
                "=== Starting read repair pass (consistency {}, batch size {}) ===",
                consistency,
                batch_size.max(1)
            ));
        }
        Self {
            id: Uuid::new_v4(),
            collection,
            ids,
            cursor: 0,
            batch_size: batch_size.max(1),
            consistency,
            log,
            delivered: 0,
            counters: RepairCounters::default(),
            started_at: Utc::now(),
            summarized: false,
        }
    }

    pub fn handle(&self) -> JobHandle {
        JobHandle {
            id: self.id,
            collection: self.collection.clone(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn total(&self) -> usize {
        self.ids.len()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn log(&self) -> &[String] {
        &self.log
    }

    pub fn counters(&self) -> RepairCounters {
        self.counters
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// True once every enumerated id has been read.
    pub fn is_complete(&self) -> bool {
        self.cursor >= self.ids.len()
    }

    /// Fraction of ids processed. An empty job counts as fully done.
    pub fn progress(&self) -> f64 {
        if self.ids.is_empty() {
            return 1.0;
        }
        (self.cursor as f64 / self.ids.len() as f64).clamp(0.0, 1.0)
    }

    /// Read the next batch of objects and advance the cursor.
    ///
    /// Returns the log lines appended since the last call. On a job that is
    /// already complete and summarized this is a no-op.
    pub async fn process_next_batch(&mut self, api: &dyn ClusterApi) -> BatchUpdate {
        let total = self.ids.len();
        let end = (self.cursor + self.batch_size).min(total);

        for index in self.cursor..end {
            let id = &self.ids[index];
            let outcome = api
                .read_with_consistency(&self.collection, id, self.consistency)
                .await;
            let position = format!("[{}/{}] UUID={}", index + 1, total, id);
            let line = match outcome {
                ReadOutcome::Found => {
                    self.counters.found += 1;
                    position
                }
                ReadOutcome::NotFound => {
                    self.counters.not_found += 1;
                    format!("{} => Not found.", position)
                }
                ReadOutcome::Failed { status, message } => {
                    self.counters.failed += 1;
                    warn!(collection = %self.collection, id = %id, status = ?status, "repair read failed");
                    match status {
                        Some(code) => format!("{} => Error {}: {}", position, code, message),
                        None => format!("{} => Error: {}", position, message),
                    }
                }
            };
            self.log.push(line);
        }
        self.cursor = end;

        if self.is_complete() && !self.summarized {
            self.summarized = true;
            self.log.push(format!(
                "=== Read repair complete for '{}': {} processed, {} found, {} not found, {} errors ===",
                self.collection,
                total,
                self.counters.found,
                self.counters.not_found,
                self.counters.failed
            ));
        }

        debug!(
            collection = %self.collection,
            cursor = self.cursor,
            total,
            "repair batch processed"
        );

        let log_delta = self.log[self.delivered..].to_vec();
        self.delivered = self.log.len();

        BatchUpdate {
            log_delta,
            progress: self.progress(),
            processed: self.cursor,
            total,
            done: self.is_complete(),
        }
    }
}

/// Owns the single repair job slot.
///
/// Methods take `&mut self`, so two batches of the same job can never run at
/// the same time.
pub struct RepairOrchestrator {
    api: Arc<dyn ClusterApi>,
    settings: RepairSettings,
    job: Option<RepairJob>,
}

impl RepairOrchestrator {
    pub fn new(api: Arc<dyn ClusterApi>, settings: RepairSettings) -> Self {
        Self {
            api,
            settings,
            job: None,
        }
    }

    pub fn settings(&self) -> &RepairSettings {
        &self.settings
    }

    pub fn active_job(&self) -> Option<&RepairJob> {
        self.job.as_ref()
    }

    /// Enumerate `collection` and make the new job active.
    ///
    /// Fails with [`RepairError::JobActive`] if a job already occupies the
    /// slot. If any listing page fails the error is returned and no job is
    /// created.
    pub async fn start_job(&mut self, collection: &str) -> Result<&RepairJob> {
        if let Some(job) = &self.job {
            return Err(RepairError::JobActive {
                collection: job.collection().to_string(),
            });
        }

        let ids = enumerate_object_ids(
            self.api.as_ref(),
            collection,
            self.settings.page_size,
            self.settings.consistency,
        )
        .await?;

        let job = RepairJob::new(
            collection,
            ids,
            self.settings.batch_size,
            self.settings.consistency,
        );
        info!(
            collection,
            job_id = %job.id(),
            objects = job.total(),
            "repair job started"
        );
        Ok(&*self.job.insert(job))
    }

    /// Run one batch of the active job.
    ///
    /// When the batch finishes the job, the slot is cleared; a further call
    /// returns [`RepairError::NoActiveJob`].
    pub async fn process_next_batch(&mut self) -> Result<BatchUpdate> {
        let job = self.job.as_mut().ok_or(RepairError::NoActiveJob)?;
        let update = job.process_next_batch(self.api.as_ref()).await;

        if update.done {
            let counters = job.counters();
            info!(
                collection = %job.collection(),
                job_id = %job.id(),
                found = counters.found,
                not_found = counters.not_found,
                failed = counters.failed,
                "repair job complete"
            );
            self.job = None;
        }

        Ok(update)
    }

    /// Discard the active job, whatever its progress.
    ///
    /// Returns whether a job was discarded.
    pub fn stop_job(&mut self) -> bool {
        match self.job.take() {
            Some(job) => {
                info!(
                    collection = %job.collection(),
                    job_id = %job.id(),
                    cursor = job.cursor(),
                    total = job.total(),
                    "repair job stopped"
                );
                true
            }
            None => false,
        }
    }

    /// Discard any active job and start a fresh one for `collection`.
    pub async fn cancel_and_restart(&mut self, collection: &str) -> Result<&RepairJob> {
        self.stop_job();
        self.start_job(collection).await
    }
}
