use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use serde::Deserialize;

use rampart_model::{
    JobId, JobRecord,
    api::{JobListResponse, SubmitJobRequest, SubmitJobResponse},
};

use crate::infra::{
    app_state::AppState,
    errors::{ApiError, ApiResult},
};

const DEFAULT_LIST_LIMIT: u32 = 50;
/// Larger `limit` values are clamped, not rejected.
const MAX_LIST_LIMIT: u32 = 500;

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct ListJobsQuery {
    pub limit: Option<u32>,
}

/// Accept an assessment job and hand it to the pipeline.
///
/// 202 means the job is durably recorded and enqueued, never that it has
/// been assessed; clients poll [`get_job`] with the returned id.
pub async fn submit_job(
    State(state): State<AppState>,
    Json(request): Json<SubmitJobRequest>,
) -> ApiResult<(StatusCode, Json<SubmitJobResponse>)> {
    let record = state
        .dispatcher
        .dispatch(&request.target, request.kind)
        .await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(SubmitJobResponse { job_id: record.id }),
    ))
}

/// Current record for one job, terminal result or error included.
pub async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<JobRecord>> {
    let id: JobId = id
        .parse()
        .map_err(|_| ApiError::bad_request(format!("'{id}' is not a valid job id")))?;
    let record = state.store.fetch(id).await?;
    Ok(Json(record))
}

/// Most recently submitted jobs first.
pub async fn list_jobs(
    State(state): State<AppState>,
    Query(query): Query<ListJobsQuery>,
) -> ApiResult<Json<JobListResponse>> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_LIST_LIMIT)
        .min(MAX_LIST_LIMIT);
    let jobs = state.store.list_recent(limit).await?;
    Ok(Json(JobListResponse { jobs }))
}
