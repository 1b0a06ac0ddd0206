use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::assessment::AssessmentReport;
use crate::ids::JobId;

/// What an assessment job does with its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobKind {
    /// Probe a host/network target for reachable services.
    NetworkScan,
    /// Match a software keyword against the advisory catalog.
    VulnerabilityLookup,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::NetworkScan => "network-scan",
            JobKind::VulnerabilityLookup => "vulnerability-lookup",
        }
    }
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for JobKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "network-scan" => Ok(JobKind::NetworkScan),
            "vulnerability-lookup" => Ok(JobKind::VulnerabilityLookup),
            other => Err(format!("unknown job kind: {other}")),
        }
    }
}

/// Lifecycle state of a job.
///
/// Transitions are monotonic and one-directional:
/// `queued -> processing -> completed | failed`. Nothing ever leaves a
/// terminal state, and the `queued -> processing` step is claimed with a
/// conditional write so duplicate deliveries cannot re-execute work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobState {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Queued => "queued",
            JobState::Processing => "processing",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for JobState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(JobState::Queued),
            "processing" => Ok(JobState::Processing),
            "completed" => Ok(JobState::Completed),
            "failed" => Ok(JobState::Failed),
            other => Err(format!("unknown job state: {other}")),
        }
    }
}

/// Durable record of one assessment job.
///
/// The job store is the single source of truth for these fields; queue
/// messages carry only the ID. `result` is populated only on `completed`,
/// `error` only on `failed`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: JobId,
    pub target: String,
    pub kind: JobKind,
    pub status: JobState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// How many times a worker has claimed this job (redelivery audit).
    pub attempts: i64,
    /// Worker that owned the terminal transition, for audit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processed_via: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<AssessmentReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl JobRecord {
    /// A fresh record in `queued` state, as written by the dispatcher.
    pub fn queued(target: impl Into<String>, kind: JobKind) -> Self {
        let now = Utc::now();
        JobRecord {
            id: JobId::new(),
            target: target.into(),
            kind,
            status: JobState::Queued,
            created_at: now,
            updated_at: now,
            attempts: 0,
            processed_via: None,
            result: None,
            error: None,
        }
    }
}
