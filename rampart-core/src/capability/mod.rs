//! External assessment capabilities.
//!
//! A capability is the black box a worker invokes for one job kind: given
//! a validated target, produce a normalized finding list. Two built-ins
//! ship with the pipeline: a TCP connect probe for network scans and an
//! embedded advisory-catalog matcher for vulnerability lookups.

pub mod lookup;
pub mod probe;

pub use lookup::CatalogLookup;
pub use probe::{PortProbe, ProbeConfig};

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use rampart_model::{Finding, JobKind};

use crate::error::Result;

/// A black-box assessment provider.
///
/// Implementations run inside the owning worker and are wrapped in a hard
/// timeout there; they should not install their own deadline handling.
#[async_trait]
pub trait AssessmentCapability: Send + Sync {
    /// The job kind this capability serves.
    fn kind(&self) -> JobKind;

    /// Stable identifier, used in logs and audit fields.
    fn name(&self) -> &'static str;

    /// Execute the assessment, returning a normalized finding list. An
    /// empty list is a legitimate outcome: nothing reachable, or no
    /// catalog matches.
    async fn execute(&self, target: &str) -> Result<Vec<Finding>>;
}

/// Kind-indexed set of registered capabilities.
#[derive(Default)]
pub struct CapabilityRegistry {
    by_kind: HashMap<JobKind, Arc<dyn AssessmentCapability>>,
}

impl fmt::Debug for CapabilityRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut kinds: Vec<&'static str> = self.by_kind.keys().map(JobKind::as_str).collect();
        kinds.sort_unstable();
        f.debug_struct("CapabilityRegistry")
            .field("kinds", &kinds)
            .finish()
    }
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with both built-in capabilities under default tuning.
    pub fn builtin() -> Result<Self> {
        let mut registry = Self::new();
        registry.register(Arc::new(PortProbe::new(ProbeConfig::default())));
        registry.register(Arc::new(CatalogLookup::from_embedded()?));
        Ok(registry)
    }

    /// Register `capability`, replacing any previous provider for its kind.
    pub fn register(&mut self, capability: Arc<dyn AssessmentCapability>) {
        self.by_kind.insert(capability.kind(), capability);
    }

    pub fn get(&self, kind: JobKind) -> Option<Arc<dyn AssessmentCapability>> {
        self.by_kind.get(&kind).cloned()
    }

    pub fn kinds(&self) -> Vec<JobKind> {
        self.by_kind.keys().copied().collect()
    }
}
