//! Deterministic risk scoring.
//!
//! Converts raw findings into per-finding risk assessments and an aggregate
//! report. Scoring is a pure function of its inputs: no I/O, no clock, no
//! randomness, so identical findings always produce identical assessments.
//!
//! Two named profiles cover the two assessment kinds. Catalog lookups carry
//! authoritative CVSS data, so severity dominates (60/30/10). Raw scan
//! findings have heuristic severity at best, so the surface profile shifts
//! weight onto exposure and clustering (40/30/20/10) and adds a
//! business-impact hint.

use rampart_model::{
    AssessmentReport, Exposure, Finding, JobKind, RiskAssessment, RiskCategory, ScoredFinding,
    Treatment,
};

use crate::config::CategoryThresholds;

/// Named weighting scheme applied to a finding's terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScoringProfile {
    /// Severity-dominated profile for vulnerability-catalog findings.
    CvssWeighted,
    /// Exposure/surface-dominated profile for raw network-scan findings.
    SurfaceWeighted,
}

impl ScoringProfile {
    /// Canonical profile for a job kind. Exactly one profile applies per
    /// kind; they are not interchangeable.
    pub fn for_kind(kind: JobKind) -> Self {
        match kind {
            JobKind::VulnerabilityLookup => ScoringProfile::CvssWeighted,
            JobKind::NetworkScan => ScoringProfile::SurfaceWeighted,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ScoringProfile::CvssWeighted => "cvss-weighted",
            ScoringProfile::SurfaceWeighted => "surface-weighted",
        }
    }

    /// Term weights in fixed order: severity, exposure, density, impact.
    /// Each profile's weights sum to 1.0.
    fn weights(&self) -> [f64; 4] {
        match self {
            ScoringProfile::CvssWeighted => [0.6, 0.3, 0.1, 0.0],
            ScoringProfile::SurfaceWeighted => [0.4, 0.3, 0.2, 0.1],
        }
    }
}

impl std::fmt::Display for ScoringProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Caller-supplied context shared by every finding of one assessment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreContext {
    /// Number of findings co-located on the same asset, including this one.
    pub co_located: usize,
    /// Business-criticality hint on a 0-100 scale; `None` falls back to a
    /// neutral midpoint.
    pub impact_hint: Option<f64>,
}

impl Default for ScoreContext {
    fn default() -> Self {
        Self {
            co_located: 1,
            impact_hint: None,
        }
    }
}

/// Midpoint used when a finding carries no severity score. Absence of data
/// is not evidence of safety, so the term never defaults to zero.
const MISSING_SEVERITY_MIDPOINT: f64 = 50.0;

const TERM_NAMES: [&str; 4] = ["severity", "exposure", "density", "impact"];

/// Score one finding under `profile`, yielding its assessment.
pub fn score_finding(
    profile: ScoringProfile,
    finding: &Finding,
    context: &ScoreContext,
    thresholds: &CategoryThresholds,
) -> RiskAssessment {
    let (severity_term, severity_missing) = match finding.severity_score {
        Some(raw) => (raw.clamp(0.0, 10.0) * 10.0, false),
        None => (MISSING_SEVERITY_MIDPOINT, true),
    };
    let exposure_term = exposure_term(finding.exposure);
    let density_term = (context.co_located.max(1) as f64 * 10.0).min(100.0);
    let impact_term = context.impact_hint.unwrap_or(50.0).clamp(0.0, 100.0);

    let terms = [severity_term, exposure_term, density_term, impact_term];
    let weights = profile.weights();

    let mut score = 0.0;
    let mut dominant = 0usize;
    let mut dominant_value = f64::MIN;
    for (index, (term, weight)) in terms.iter().zip(weights.iter()).enumerate() {
        let weighted = term * weight;
        score += weighted;
        if weighted > dominant_value {
            dominant = index;
            dominant_value = weighted;
        }
    }
    let score = round2(score.clamp(0.0, 100.0));

    let category = categorize(score, thresholds);
    let treatment = select_treatment(category, finding);

    let mut rationale = format!(
        "{} term dominates ({:.1} of {:.1} weighted points)",
        TERM_NAMES[dominant], dominant_value, score
    );
    if severity_missing {
        rationale.push_str("; no severity score reported, defaulted to conservative midpoint");
    }

    RiskAssessment {
        score,
        category,
        treatment,
        rationale,
    }
}

/// Map a 0-100 score onto a category via inclusive thresholds.
pub fn categorize(score: f64, thresholds: &CategoryThresholds) -> RiskCategory {
    if score >= thresholds.critical {
        RiskCategory::Critical
    } else if score >= thresholds.high {
        RiskCategory::High
    } else if score >= thresholds.medium {
        RiskCategory::Medium
    } else if score >= thresholds.low_floor {
        RiskCategory::Low
    } else {
        RiskCategory::VeryLow
    }
}

fn exposure_term(exposure: Exposure) -> f64 {
    match exposure {
        Exposure::Public => 100.0,
        Exposure::Perimeter => 75.0,
        Exposure::Internal => 50.0,
        Exposure::Local => 25.0,
    }
}

fn select_treatment(category: RiskCategory, finding: &Finding) -> Treatment {
    if category == RiskCategory::Critical && finding.exposure == Exposure::Public {
        return Treatment::Avoid;
    }
    if vendor_managed(&finding.classification) {
        return Treatment::Transfer;
    }
    if matches!(category, RiskCategory::High | RiskCategory::Critical) {
        return Treatment::Mitigate;
    }
    Treatment::Accept
}

/// Whether an asset classification indicates a service someone else runs,
/// shifting the treatment toward contractual transfer.
fn vendor_managed(classification: &str) -> bool {
    let lowered = classification.to_ascii_lowercase();
    ["vendor", "third-party", "saas", "managed"]
        .iter()
        .any(|marker| lowered.contains(marker))
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Score every finding of a completed assessment and fold the results into
/// a report. The aggregate takes the worst finding: maximum score, its
/// category, and the most drastic recommended treatment.
pub fn assess_findings(
    kind: JobKind,
    findings: Vec<Finding>,
    thresholds: &CategoryThresholds,
) -> AssessmentReport {
    let profile = ScoringProfile::for_kind(kind);
    let context = ScoreContext {
        co_located: findings.len().max(1),
        impact_hint: None,
    };

    let findings: Vec<ScoredFinding> = findings
        .into_iter()
        .map(|finding| {
            let assessment = score_finding(profile, &finding, &context, thresholds);
            ScoredFinding {
                finding,
                assessment,
            }
        })
        .collect();

    let aggregate_score = findings
        .iter()
        .map(|scored| scored.assessment.score)
        .fold(0.0_f64, f64::max);
    let aggregate_category = categorize(aggregate_score, thresholds);
    let recommended_treatment = findings
        .iter()
        .map(|scored| scored.assessment.treatment)
        .max()
        .unwrap_or(Treatment::Accept);

    AssessmentReport {
        profile: profile.as_str().to_string(),
        findings,
        aggregate_score,
        aggregate_category,
        recommended_treatment,
    }
}
