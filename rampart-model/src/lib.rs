//! Core data model definitions shared across Rampart crates.
#![allow(missing_docs)]

pub mod api;
pub mod assessment;
pub mod finding;
pub mod ids;
pub mod job;

// Flat re-exports for downstream consumers.
pub use api::{
    ConsumerStatusResponse, JobListResponse, SubmitJobRequest,
    SubmitJobResponse,
};
pub use assessment::{
    AssessmentReport, RiskAssessment, RiskCategory, ScoredFinding, Treatment,
};
pub use finding::{Exposure, Finding};
pub use ids::JobId;
pub use job::{JobKind, JobRecord, JobState};
