//! Job API endpoints.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use portage_core::problem;
use portage_core::Problem;
use serde_json::json;
use utoipa::OpenApi;

use crate::job::JobView;
use crate::store::JobStore;
use crate::ws::stream_job_logs;

pub struct JobsState {
    pub jobs: Arc<JobStore>,
}

#[derive(OpenApi)]
#[openapi(
    paths(list_jobs, get_job, cancel_job),
    components(schemas(JobView)),
    info(
        title = "Jobs API",
        description = "Async job inspection, cancellation and log streaming",
        version = "1.0.0"
    )
)]
pub struct JobsApiDoc;

pub fn configure_routes(state: Arc<JobsState>) -> Router {
    Router::new()
        .route("/jobs", get(list_jobs))
        .route("/jobs/{id}", get(get_job))
        .route("/jobs/{id}/cancel", post(cancel_job))
        .with_state(state)
}

/// WebSocket routes, mounted outside `/api`.
pub fn ws_routes(state: Arc<JobsState>) -> Router {
    Router::new()
        .route("/ws/jobs/{id}/logs", get(stream_job_logs))
        .with_state(state)
}

/// List all jobs, most recent first
#[utoipa::path(
    tag = "Jobs",
    get,
    path = "/jobs",
    responses(
        (status = 200, description = "All jobs", body = [JobView])
    )
)]
async fn list_jobs(State(state): State<Arc<JobsState>>) -> impl IntoResponse {
    let jobs: Vec<JobView> = state.jobs.list().iter().map(|j| j.snapshot()).collect();
    Json(jobs)
}

/// Get a job by ID
#[utoipa::path(
    tag = "Jobs",
    get,
    path = "/jobs/{id}",
    params(("id" = String, Path, description = "Job ID")),
    responses(
        (status = 200, description = "Job details", body = JobView),
        (status = 404, description = "Job not found")
    )
)]
async fn get_job(
    State(state): State<Arc<JobsState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, Problem> {
    let job = state.jobs.get(&id).ok_or_else(|| {
        problem::new(StatusCode::NOT_FOUND)
            .with_title("Job Not Found")
            .with_detail(format!("no job with id {id}"))
    })?;
    Ok(Json(job.snapshot()))
}

/// Request cooperative cancellation of a running job
#[utoipa::path(
    tag = "Jobs",
    post,
    path = "/jobs/{id}/cancel",
    params(("id" = String, Path, description = "Job ID")),
    responses(
        (status = 202, description = "Cancellation requested"),
        (status = 404, description = "Job not found"),
        (status = 409, description = "Job already finished")
    )
)]
async fn cancel_job(
    State(state): State<Arc<JobsState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, Problem> {
    let job = state.jobs.get(&id).ok_or_else(|| {
        problem::new(StatusCode::NOT_FOUND)
            .with_title("Job Not Found")
            .with_detail(format!("no job with id {id}"))
    })?;
    if job.status().is_terminal() {
        return Err(problem::new(StatusCode::CONFLICT)
            .with_title("Job Already Finished")
            .with_detail(format!("job is {}", job.status())));
    }
    job.cancel();
    Ok((StatusCode::ACCEPTED, Json(json!({"status": "cancelling"}))))
}
