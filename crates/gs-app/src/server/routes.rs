use std::sync::Arc;

use axum::Router;
use axum::routing::{delete, get, post};

use crate::server::routes::job::{delete_job, health, job_status, list_jobs, submit_job};
use crate::server::state::SimulatedJobs;

mod job;

pub fn api_routes() -> Router<Arc<SimulatedJobs>> {
    Router::new()
        .route("/health", get(health))
        .route("/submit", post(submit_job))
        .route("/status/{id}", get(job_status))
        .route("/jobs", get(list_jobs))
        .route("/jobs/{id}", delete(delete_job))
}
