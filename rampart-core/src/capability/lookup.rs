//! Advisory-catalog matching for vulnerability-lookup jobs.
//!
//! The catalog is a vendored JSON snapshot compiled into the binary, so a
//! lookup never leaves the process. Matching is deliberately loose: a
//! keyword hits a record when it is contained in (or contains) the record's
//! product name or one of its aliases, case-insensitively.

use async_trait::async_trait;
use rampart_model::{Exposure, Finding, JobKind};
use serde::Deserialize;
use tracing::debug;

use crate::capability::AssessmentCapability;
use crate::error::Result;

const EMBEDDED_CATALOG: &str = include_str!("advisories.json");

#[derive(Debug, Deserialize)]
struct CatalogFile {
    catalog_version: String,
    advisories: Vec<AdvisoryRecord>,
}

/// One vendored advisory entry.
#[derive(Debug, Clone, Deserialize)]
struct AdvisoryRecord {
    id: String,
    product: String,
    #[serde(default)]
    keywords: Vec<String>,
    #[serde(default)]
    affected_versions: Option<String>,
    /// Source severity, 0-10. Null for advisories still awaiting analysis.
    severity: Option<f64>,
    exposure: Exposure,
    classification: String,
}

impl AdvisoryRecord {
    fn matches(&self, needle: &str) -> bool {
        std::iter::once(&self.product)
            .chain(self.keywords.iter())
            .any(|candidate| {
                let candidate = candidate.to_lowercase();
                candidate.contains(needle) || needle.contains(candidate.as_str())
            })
    }

    fn to_finding(&self) -> Finding {
        let mut finding = Finding::new(
            self.id.as_str(),
            self.product.as_str(),
            self.exposure,
            self.classification.as_str(),
        );
        if let Some(versions) = &self.affected_versions {
            finding = finding.with_version(versions);
        }
        if let Some(score) = self.severity {
            finding = finding.with_severity(score);
        }
        finding
    }
}

/// Catalog-backed capability for [`JobKind::VulnerabilityLookup`].
#[derive(Debug)]
pub struct CatalogLookup {
    catalog_version: String,
    records: Vec<AdvisoryRecord>,
}

impl CatalogLookup {
    /// Load the compiled-in catalog snapshot.
    pub fn from_embedded() -> Result<Self> {
        Self::from_json(EMBEDDED_CATALOG)
    }

    /// Load a catalog from its JSON form. Useful for tests and for
    /// deployments that ship a fresher snapshot than the compiled one.
    pub fn from_json(json: &str) -> Result<Self> {
        let file: CatalogFile = serde_json::from_str(json)?;
        debug!(
            version = %file.catalog_version,
            records = file.advisories.len(),
            "advisory catalog loaded"
        );
        Ok(Self {
            catalog_version: file.catalog_version,
            records: file.advisories,
        })
    }

    pub fn catalog_version(&self) -> &str {
        &self.catalog_version
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl AssessmentCapability for CatalogLookup {
    fn kind(&self) -> JobKind {
        JobKind::VulnerabilityLookup
    }

    fn name(&self) -> &'static str {
        "catalog-lookup"
    }

    async fn execute(&self, target: &str) -> Result<Vec<Finding>> {
        let needle = target.trim().to_lowercase();
        let mut findings: Vec<Finding> = self
            .records
            .iter()
            .filter(|record| record.matches(&needle))
            .map(AdvisoryRecord::to_finding)
            .collect();
        findings.sort_by(|a, b| a.identifier.cmp(&b.identifier));
        debug!(keyword = %target, matches = findings.len(), "catalog lookup finished");
        Ok(findings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn known_keyword_returns_advisory_findings() {
        let lookup = CatalogLookup::from_embedded().expect("catalog");
        let findings = lookup.execute("log4j").await.expect("lookup");
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].identifier, "CVE-2021-44228");
        assert_eq!(findings[0].severity_score, Some(10.0));
        assert_eq!(findings[0].exposure, Exposure::Public);
    }

    #[tokio::test]
    async fn matching_ignores_case_and_padding() {
        let lookup = CatalogLookup::from_embedded().expect("catalog");
        let findings = lookup.execute("  OpenSSL ").await.expect("lookup");
        assert!(findings.iter().any(|f| f.identifier == "CVE-2014-0160"));
    }

    #[tokio::test]
    async fn alias_keywords_also_match() {
        let lookup = CatalogLookup::from_embedded().expect("catalog");
        let findings = lookup.execute("heartbleed").await.expect("lookup");
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].product, "openssl");
    }

    #[tokio::test]
    async fn unknown_keyword_returns_empty_list() {
        let lookup = CatalogLookup::from_embedded().expect("catalog");
        let findings = lookup
            .execute("definitely-not-a-cataloged-product")
            .await
            .expect("lookup");
        assert!(findings.is_empty());
    }

    #[tokio::test]
    async fn unscored_advisories_surface_with_null_severity() {
        let lookup = CatalogLookup::from_embedded().expect("catalog");
        let findings = lookup.execute("fortivoice").await.expect("lookup");
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity_score, None);
        assert_eq!(findings[0].exposure, Exposure::Perimeter);
    }

    #[test]
    fn embedded_catalog_parses_and_is_versioned() {
        let lookup = CatalogLookup::from_embedded().expect("catalog");
        assert!(!lookup.is_empty());
        assert!(lookup.len() >= 14);
        assert_eq!(lookup.catalog_version(), "2025-08-01");
    }

    #[test]
    fn malformed_catalog_json_is_rejected() {
        let err = CatalogLookup::from_json("{\"advisories\": 42}").expect_err("must fail");
        assert!(matches!(err, crate::error::PipelineError::Serialization(_)));
    }
}
