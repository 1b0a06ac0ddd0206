use serde::{Deserialize, Serialize};

/// Network reachability tier of the asset a finding was observed on.
///
/// Inferred from port/network context by the capability that produced the
/// finding. Perimeter covers DMZ-like segments: privately addressed but
/// serving edge-facing protocols.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Exposure {
    Public,
    Perimeter,
    Internal,
    Local,
}

impl Exposure {
    pub fn as_str(&self) -> &'static str {
        match self {
            Exposure::Public => "public",
            Exposure::Perimeter => "perimeter",
            Exposure::Internal => "internal",
            Exposure::Local => "local",
        }
    }
}

impl std::fmt::Display for Exposure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One raw observation inside a job's result.
///
/// For a network scan this is an open port with its identified service; for
/// a vulnerability lookup it is a single advisory record. `severity_score`
/// is nullable on purpose: absence of severity data is a modeled state that
/// the scoring engine must handle conservatively, never a silent zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    /// Port+protocol (`"22/tcp"`) or an advisory identifier (`"CVE-..."`).
    pub identifier: String,
    pub product: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Base severity on the 0-10 source scale, when known.
    pub severity_score: Option<f64>,
    pub exposure: Exposure,
    /// Free-text asset category, e.g. "database", "web", "vendor-managed".
    pub classification: String,
}

impl Finding {
    pub fn new(
        identifier: impl Into<String>,
        product: impl Into<String>,
        exposure: Exposure,
        classification: impl Into<String>,
    ) -> Self {
        Finding {
            identifier: identifier.into(),
            product: product.into(),
            version: None,
            severity_score: None,
            exposure,
            classification: classification.into(),
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn with_severity(mut self, score: f64) -> Self {
        self.severity_score = Some(score);
        self
    }
}
