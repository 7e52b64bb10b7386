use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde_json::{Value, json};
use tracing::{debug, info};

use crate::backend::{JobListResponse, SubmitResponse};
use crate::server::state::SimulatedJobs;

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

fn error_response(status: StatusCode, error: String) -> Response {
    (status, Json(ErrorResponse { error })).into_response()
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn submit_job(
    State(state): State<Arc<SimulatedJobs>>,
    Json(body): Json<Value>,
) -> Response {
    if !body.is_object() {
        return error_response(
            StatusCode::BAD_REQUEST,
            "request body must be a JSON object".to_string(),
        );
    }

    let job_id = state.create(&body);
    info!(%job_id, "Accepted simulated job");
    (StatusCode::OK, Json(SubmitResponse { job_id })).into_response()
}

pub async fn job_status(
    State(state): State<Arc<SimulatedJobs>>,
    Path(id): Path<String>,
) -> Response {
    match state.poll(&id) {
        Some(report) => {
            debug!(job_id = %id, status = ?report.status, progress = ?report.progress, "Status requested");
            Json(report).into_response()
        }
        None => error_response(StatusCode::NOT_FOUND, format!("Job not found: {id}")),
    }
}

pub async fn list_jobs(State(state): State<Arc<SimulatedJobs>>) -> Json<JobListResponse> {
    Json(JobListResponse { jobs: state.list() })
}

pub async fn delete_job(
    State(state): State<Arc<SimulatedJobs>>,
    Path(id): Path<String>,
) -> Response {
    if state.remove(&id) {
        info!(job_id = %id, "Deleted simulated job");
        StatusCode::NO_CONTENT.into_response()
    } else {
        error_response(StatusCode::NOT_FOUND, format!("Job not found: {id}"))
    }
}
