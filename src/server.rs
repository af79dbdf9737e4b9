//! Dashboard HTTP API.
//!
//! Exposes the repair session as a JSON API so a browser dashboard can run
//! consistency checks and drive a repair one batch per request. The session
//! lives behind an async mutex: requests are served one at a time, and a stop
//! request issued during a batch takes effect once that batch returns.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`    | `/health` | Health check (returns version) |
//! | `GET`    | `/consistency` | Run a consistency check |
//! | `GET`    | `/inventory` | Normalized shard inventory and derived views |
//! | `GET`    | `/repair` | Status of the active repair job, or `null` |
//! | `POST`   | `/repair` | Start a repair: `{ "collection": "Article" }` |
//! | `POST`   | `/repair/{id}/continue` | Run the next batch |
//! | `DELETE` | `/repair/{id}` | Stop the job |
//! | `GET`    | `/objects/{collection}/{id}/nodes` | Per-node presence of an object (`?tenant=` for multi-tenant collections) |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "invalid_selection", "message": "..." } }
//! ```
//!
//! Error codes: `bad_request` / `invalid_selection` (400), `not_found` (404),
//! `job_active` (409), `upstream` (502).

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;
use uuid::Uuid;

use crate::consistency::ConsistencyReport;
use crate::error::RepairError;
use crate::models::InconsistencyReport;
use crate::repair::{BatchUpdate, JobHandle};
use crate::session::{InventoryView, JobStatus, NodeObjectPresence, RepairSession};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    session: Arc<Mutex<RepairSession>>,
}

impl AppState {
    pub fn new(session: RepairSession) -> Self {
        Self {
            session: Arc::new(Mutex::new(session)),
        }
    }
}

/// Build the router. Split out from [`run_server`] so tests can serve it on
/// an ephemeral port.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/consistency", get(handle_consistency))
        .route("/inventory", get(handle_inventory))
        .route("/repair", get(handle_status).post(handle_start))
        .route("/repair/{id}/continue", post(handle_continue))
        .route("/repair/{id}", axum::routing::delete(handle_stop))
        .route("/objects/{collection}/{id}/nodes", get(handle_locate))
        .layer(cors)
        .with_state(state)
}

/// Serve the dashboard API on `bind` until the process is terminated.
pub async fn run_server(bind: &str, session: RepairSession) -> anyhow::Result<()> {
    let app = router(AppState::new(session));

    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!(bind = %listener.local_addr()?, "dashboard API listening");
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

impl From<RepairError> for AppError {
    fn from(err: RepairError) -> Self {
        let status = match &err {
            RepairError::InvalidSelection(_) => StatusCode::BAD_REQUEST,
            RepairError::JobActive { .. } => StatusCode::CONFLICT,
            RepairError::NoActiveJob | RepairError::StaleHandle(_) => StatusCode::NOT_FOUND,
            RepairError::Connectivity { .. }
            | RepairError::Status { .. }
            | RepairError::Protocol { .. } => StatusCode::BAD_GATEWAY,
        };
        AppError {
            status,
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}

fn parse_job_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| bad_request(format!("invalid job id: {}", raw)))
}

// ============ Handlers ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

#[derive(Serialize)]
struct ConsistencyResponse {
    consistent: bool,
    summary: String,
    rows: Vec<InconsistencyReport>,
    collections: Vec<String>,
}

impl From<ConsistencyReport> for ConsistencyResponse {
    fn from(report: ConsistencyReport) -> Self {
        Self {
            consistent: report.is_consistent(),
            summary: report.summary(),
            rows: report.rows().to_vec(),
            collections: report.collections().to_vec(),
        }
    }
}

async fn handle_consistency(
    State(state): State<AppState>,
) -> Result<Json<ConsistencyResponse>, AppError> {
    let report = state.session.lock().await.check_consistency().await?;
    Ok(Json(ConsistencyResponse::from(report)))
}

async fn handle_inventory(State(state): State<AppState>) -> Result<Json<InventoryView>, AppError> {
    let view = state.session.lock().await.inventory().await?;
    Ok(Json(view))
}

async fn handle_status(State(state): State<AppState>) -> Json<Option<JobStatus>> {
    Json(state.session.lock().await.status())
}

#[derive(Deserialize)]
struct StartRequest {
    #[serde(default)]
    collection: String,
}

#[derive(Serialize)]
struct StartResponse {
    job: JobHandle,
    status: Option<JobStatus>,
}

async fn handle_start(
    State(state): State<AppState>,
    Json(req): Json<StartRequest>,
) -> Result<Json<StartResponse>, AppError> {
    let mut session = state.session.lock().await;
    let job = session.start_repair(&req.collection).await?;
    Ok(Json(StartResponse {
        job,
        status: session.status(),
    }))
}

async fn handle_continue(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<BatchUpdate>, AppError> {
    let job_id = parse_job_id(&id)?;
    let update = state.session.lock().await.continue_repair(job_id).await?;
    Ok(Json(update))
}

#[derive(Serialize)]
struct StopResponse {
    stopped: bool,
}

async fn handle_stop(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<StopResponse>, AppError> {
    let job_id = parse_job_id(&id)?;
    let stopped = state.session.lock().await.stop_repair(job_id)?;
    Ok(Json(StopResponse { stopped }))
}

#[derive(Deserialize)]
struct LocateQuery {
    tenant: Option<String>,
}

#[derive(Serialize)]
struct LocateResponse {
    collection: String,
    id: String,
    tenant: Option<String>,
    nodes: Vec<NodeObjectPresence>,
}

async fn handle_locate(
    State(state): State<AppState>,
    Path((collection, id)): Path<(String, String)>,
    Query(query): Query<LocateQuery>,
) -> Result<Json<LocateResponse>, AppError> {
    let nodes = state
        .session
        .lock()
        .await
        .locate_object(&collection, &id, query.tenant.as_deref())
        .await?;
    Ok(Json(LocateResponse {
        collection,
        id,
        tenant: query.tenant,
        nodes,
    }))
}
