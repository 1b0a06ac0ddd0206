use serde::{Deserialize, Serialize};

use crate::finding::Finding;

/// Risk bucket derived from a score via fixed thresholds.
///
/// Ordered so that aggregation can take a conservative maximum.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum RiskCategory {
    VeryLow,
    Low,
    Medium,
    High,
    Critical,
}

impl RiskCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskCategory::VeryLow => "very-low",
            RiskCategory::Low => "low",
            RiskCategory::Medium => "medium",
            RiskCategory::High => "high",
            RiskCategory::Critical => "critical",
        }
    }
}

impl std::fmt::Display for RiskCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Recommended risk-response action.
///
/// Ordered by escalation: `accept` is the mildest response, `avoid` the
/// most drastic.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum Treatment {
    Accept,
    Mitigate,
    Transfer,
    Avoid,
}

impl Treatment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Treatment::Accept => "accept",
            Treatment::Mitigate => "mitigate",
            Treatment::Transfer => "transfer",
            Treatment::Avoid => "avoid",
        }
    }
}

impl std::fmt::Display for Treatment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Derived risk verdict for a single finding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    /// Weighted score on the 0-100 scale.
    pub score: f64,
    pub category: RiskCategory,
    pub treatment: Treatment,
    /// Names the dominant contributing term and flags missing inputs.
    pub rationale: String,
}

/// A finding paired with its assessment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredFinding {
    pub finding: Finding,
    pub assessment: RiskAssessment,
}

/// Completed-job payload: every finding scored, plus a conservative roll-up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentReport {
    /// Name of the scoring profile that produced the assessments.
    pub profile: String,
    pub findings: Vec<ScoredFinding>,
    /// Highest per-finding score (0 when no findings were observed).
    pub aggregate_score: f64,
    pub aggregate_category: RiskCategory,
    pub recommended_treatment: Treatment,
}
