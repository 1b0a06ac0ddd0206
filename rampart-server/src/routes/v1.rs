use axum::{
    Router,
    routing::{get, post},
};

use crate::{
    AppState,
    handlers::{consumer, jobs},
};

/// Create all v1 API routes
pub fn create_v1_router() -> Router<AppState> {
    Router::new()
        // Job submission and inspection
        .route("/jobs", post(jobs::submit_job).get(jobs::list_jobs))
        .route("/jobs/{id}", get(jobs::get_job))
        // Consumer control plane
        .route("/consumer/start", post(consumer::start_consumer))
        .route("/consumer/stop", post(consumer::stop_consumer))
        .route("/consumer/status", get(consumer::consumer_status))
}
