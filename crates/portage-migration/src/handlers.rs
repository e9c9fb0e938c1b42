//! Migration API endpoints: preview, run, cached preview retrieval and the
//! default exclusion listing.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use portage_core::problem;
use portage_core::{ConnectionStore, Problem};
use portage_jobs::{JobStatus, JobStore};
use serde::Deserialize;
use serde_json::json;
use tracing::info;
use utoipa::{OpenApi, ToSchema};

use crate::data::{ExclusionMap, MigrationPreview, MigrationResource};
use crate::export::default_exclusions;
use crate::preview_store::{PreviewEntry, PreviewStore};
use crate::service;

pub struct MigrationState {
    pub connections: Arc<ConnectionStore>,
    pub jobs: Arc<JobStore>,
    pub previews: Arc<PreviewStore>,
}

#[derive(OpenApi)]
#[openapi(
    paths(start_preview, get_preview, start_run, list_exclusions),
    components(schemas(
        PreviewRequest,
        RunRequest,
        MigrationPreview,
        MigrationResource
    )),
    info(
        title = "Migration API",
        description = "Preview and run migrations between control planes as cancellable jobs",
        version = "1.0.0"
    )
)]
pub struct MigrationApiDoc;

pub fn configure_routes(state: Arc<MigrationState>) -> Router {
    Router::new()
        .route("/migrate/preview", post(start_preview))
        .route("/migrate/preview/{job_id}", get(get_preview))
        .route("/migrate/run", post(start_run))
        .route("/exclusions", get(list_exclusions))
        .with_state(state)
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PreviewRequest {
    pub source_id: String,
    pub destination_id: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RunRequest {
    pub destination_id: String,
    pub preview_job_id: String,
    /// Type name → resource names to drop from the migration.
    #[serde(default)]
    pub exclude: ExclusionMap,
}

fn connection_not_found(which: &str) -> Problem {
    problem::new(StatusCode::NOT_FOUND)
        .with_title("Connection Not Found")
        .with_detail(format!("{which} connection not found"))
}

/// Start an async preview job (export + preflight)
#[utoipa::path(
    tag = "Migration",
    post,
    path = "/migrate/preview",
    request_body = PreviewRequest,
    responses(
        (status = 202, description = "Preview job started"),
        (status = 404, description = "Source or destination connection not found")
    )
)]
async fn start_preview(
    State(state): State<Arc<MigrationState>>,
    Json(req): Json<PreviewRequest>,
) -> Result<impl IntoResponse, Problem> {
    let src = state
        .connections
        .get(&req.source_id)
        .ok_or_else(|| connection_not_found("source"))?;
    let dst = state
        .connections
        .get(&req.destination_id)
        .ok_or_else(|| connection_not_found("destination"))?;

    let job = state.jobs.create("migration-preview", &req.source_id);
    info!("preview job {} started ({} -> {})", job.id, src.name, dst.name);

    let previews = state.previews.clone();
    let worker = job.clone();
    tokio::spawn(async move {
        let sink = worker.log_sink();
        match service::preview(&src, &dst, &*sink).await {
            Ok((preview, data)) => {
                previews.store(&worker.id, PreviewEntry { preview, data });
                worker.complete();
            }
            Err(e) => {
                worker.append_log(&format!("ERROR: {e}"));
                worker.fail(&e.to_string());
            }
        }
    });

    Ok((StatusCode::ACCEPTED, Json(json!({"job_id": job.id}))))
}

/// Get the cached preview result for a completed preview job
#[utoipa::path(
    tag = "Migration",
    get,
    path = "/migrate/preview/{job_id}",
    params(("job_id" = String, Path, description = "Preview job ID")),
    responses(
        (status = 200, description = "Preview result", body = MigrationPreview),
        (status = 404, description = "Job or preview data not found"),
        (status = 409, description = "Preview still in progress")
    )
)]
async fn get_preview(
    State(state): State<Arc<MigrationState>>,
    Path(job_id): Path<String>,
) -> Result<impl IntoResponse, Problem> {
    let job = state.jobs.get(&job_id).ok_or_else(|| {
        problem::new(StatusCode::NOT_FOUND)
            .with_title("Job Not Found")
            .with_detail(format!("no job with id {job_id}"))
    })?;

    match job.status() {
        JobStatus::Running => Ok((
            StatusCode::CONFLICT,
            Json(json!({
                "status": "running",
                "message": "preview is still in progress",
            })),
        )
            .into_response()),
        JobStatus::Failed => Ok(Json(json!({
            "status": "failed",
            "error": job.snapshot().error,
        }))
        .into_response()),
        _ => {
            let cached = state.previews.get(&job_id).ok_or_else(|| {
                problem::new(StatusCode::NOT_FOUND)
                    .with_title("Preview Not Found")
                    .with_detail("preview data not found")
            })?;
            Ok(Json(cached.preview.clone()).into_response())
        }
    }
}

/// Start the import from a previously cached preview
#[utoipa::path(
    tag = "Migration",
    post,
    path = "/migrate/run",
    request_body = RunRequest,
    responses(
        (status = 202, description = "Migration job started"),
        (status = 404, description = "Preview or destination connection not found")
    )
)]
async fn start_run(
    State(state): State<Arc<MigrationState>>,
    Json(req): Json<RunRequest>,
) -> Result<impl IntoResponse, Problem> {
    let cached = state.previews.get(&req.preview_job_id).ok_or_else(|| {
        problem::new(StatusCode::NOT_FOUND)
            .with_title("Preview Not Found")
            .with_detail("preview not found — run preview first")
    })?;
    let dst = state
        .connections
        .get(&req.destination_id)
        .ok_or_else(|| connection_not_found("destination"))?;

    let job = state.jobs.create("migration-run", &req.destination_id);
    info!("migration job {} started (destination {})", job.id, dst.name);

    let previews = state.previews.clone();
    let preview_job_id = req.preview_job_id.clone();
    let exclude = req.exclude;
    let worker = job.clone();
    tokio::spawn(async move {
        let sink = worker.log_sink();
        let cancel = worker.cancellation_token();
        let result = service::run(
            &dst,
            &cached.data,
            &cached.preview,
            &exclude,
            &cancel,
            &*sink,
        )
        .await;
        match result {
            Ok(()) => worker.complete(),
            Err(e) if e.is_cancelled() => worker.mark_cancelled(),
            Err(e) => {
                worker.append_log(&format!("ERROR: {e}"));
                worker.fail(&e.to_string());
            }
        }
        // The cached graph is single-use.
        previews.delete(&preview_job_id);
    });

    Ok((StatusCode::ACCEPTED, Json(json!({"job_id": job.id}))))
}

/// List the default resource names skipped during migration export
#[utoipa::path(
    tag = "Migration",
    get,
    path = "/exclusions",
    responses(
        (status = 200, description = "Default skip lists keyed by resource type")
    )
)]
async fn list_exclusions() -> impl IntoResponse {
    Json(json!({"migration": default_exclusions()}))
}
