//! Error types for consistency checks and repair jobs.

use uuid::Uuid;

/// Errors surfaced by the cluster client, the orchestrator, and the session.
///
/// Per-object read failures are not errors: they are recorded as
/// [`ReadOutcome::Failed`](crate::models::ReadOutcome::Failed) in the job log.
#[derive(Debug, thiserror::Error)]
pub enum RepairError {
    /// The request never produced a response (DNS, refused, timeout, TLS).
    #[error("{context}: {source}")]
    Connectivity {
        context: String,
        #[source]
        source: reqwest::Error,
    },

    /// The cluster answered with a non-success status.
    #[error("{context}: HTTP {status}: {body}")]
    Status {
        context: String,
        status: u16,
        body: String,
    },

    /// The response body could not be decoded.
    #[error("{context}: invalid response: {message}")]
    Protocol { context: String, message: String },

    /// The operator picked no collection, or one that is not a repair candidate.
    #[error("invalid selection: {0}")]
    InvalidSelection(String),

    /// A repair job already occupies the job slot.
    #[error("a repair job is already running for '{collection}'")]
    JobActive { collection: String },

    /// No repair job is active.
    #[error("no repair job is active")]
    NoActiveJob,

    /// The handle does not refer to the active job.
    #[error("repair job {0} is not the active job")]
    StaleHandle(Uuid),
}

impl RepairError {
    /// Machine-readable code used in the HTTP error contract.
    pub fn code(&self) -> &'static str {
        match self {
            RepairError::Connectivity { .. }
            | RepairError::Status { .. }
            | RepairError::Protocol { .. } => "upstream",
            RepairError::InvalidSelection(_) => "invalid_selection",
            RepairError::JobActive { .. } => "job_active",
            RepairError::NoActiveJob | RepairError::StaleHandle(_) => "not_found",
        }
    }
}

pub type Result<T, E = RepairError> = std::result::Result<T, E>;
