use serde::{Deserialize, Serialize};

use crate::ids::JobId;
use crate::job::{JobKind, JobRecord};

/// Body of `POST /jobs`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitJobRequest {
    pub target: String,
    pub kind: JobKind,
}

/// Response of `POST /jobs`: the opaque handle clients poll with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitJobResponse {
    pub job_id: JobId,
}

/// Response of `GET /jobs`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobListResponse {
    pub jobs: Vec<JobRecord>,
}

/// Response of the consumer-control endpoints.
///
/// `running` is the contract field; the gauges ride along for operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumerStatusResponse {
    pub running: bool,
    pub in_flight: usize,
    pub queue_depth: usize,
}
