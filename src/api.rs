//! HTTP surface of the executor service.
//!
//! | Method | Path | Response |
//! |--------|------|----------|
//! | GET | `/computers` | `[{name, queue_time}]` |
//! | POST | `/start_job/{computer_name}` | `{job_id}` |
//! | GET | `/job/{job_id}` | `{status, results, error}` |
//!
//! Unknown computers and unknown job ids answer 404 with `{"detail": …}`.
//! Job failures are never HTTP errors; they show up in the polled status.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::computer::{Computer, ComputerRegistry};
use crate::error::{ServerError, ServerResult};
use crate::job::{JobId, JobStatus};
use crate::manager::JobManager;
use crate::runner::JobPayload;

/// State shared by all request handlers.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ComputerRegistry>,
    pub jobs: Arc<JobManager>,
}

impl AppState {
    pub fn new(registry: ComputerRegistry, jobs: JobManager) -> Self {
        Self {
            registry: Arc::new(registry),
            jobs: Arc::new(jobs),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StartJobResponse {
    pub job_id: JobId,
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/computers", get(list_computers))
        .route("/start_job/{computer_name}", post(start_job))
        .route("/job/{job_id}", get(poll_job))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Serve the API on `listener` until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> std::io::Result<()>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        tracing::info!(addr = %addr, "Starting executor API");
    }
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
}

async fn list_computers(State(state): State<AppState>) -> Json<Vec<Computer>> {
    Json(state.registry.list().iter().map(|c| Computer::clone(c)).collect())
}

async fn start_job(
    State(state): State<AppState>,
    Path(computer_name): Path<String>,
    Json(payload): Json<JobPayload>,
) -> ServerResult<Json<StartJobResponse>> {
    let computer = state
        .registry
        .find(&computer_name)
        .ok_or(ServerError::ComputerNotFound(computer_name))?;
    let job_id = state.jobs.create_job(computer, payload)?;
    Ok(Json(StartJobResponse { job_id }))
}

async fn poll_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ServerResult<Json<JobStatus>> {
    state.jobs.job_result(&JobId::from(job_id)).map(Json)
}
