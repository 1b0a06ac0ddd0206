use std::time::Duration;

use rampart_model::JobKind;
use serde::{Deserialize, Serialize};

/// Global knobs that tune pipeline behaviour.
///
/// All fields carry defaults so a deployment can start with an empty
/// configuration payload and progressively override individual values.
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PipelineConfig {
    /// Worker pool sizing and polling cadence.
    pub workers: WorkerConfig,
    /// Capability execution timeouts per job kind.
    pub timeouts: TimeoutConfig,
    /// Housekeeping cadence and stale-work recovery bounds.
    pub housekeeping: HousekeepingConfig,
    /// Score thresholds that map risk scores onto categories.
    pub thresholds: CategoryThresholds,
}

impl PipelineConfig {
    /// Capability timeout for `kind`. Scans are allowed minutes, lookups
    /// seconds.
    pub fn timeout_for(&self, kind: JobKind) -> Duration {
        match kind {
            JobKind::NetworkScan => Duration::from_secs(self.timeouts.scan_timeout_secs),
            JobKind::VulnerabilityLookup => {
                Duration::from_secs(self.timeouts.lookup_timeout_secs)
            }
        }
    }
}

/// Worker pool sizing and queue polling cadence.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Number of concurrent consumer loops. Each loop processes one job
    /// end-to-end before requesting the next message.
    pub count: usize,
    /// How long a single broker receive blocks before the loop re-checks
    /// its shutdown and pause gates (milliseconds).
    pub poll_interval_ms: u64,
    /// Idle delay after a broker error before the loop retries (milliseconds).
    pub error_backoff_ms: u64,
    /// Upper bound on waiting for a worker to drain during shutdown (seconds).
    pub shutdown_grace_secs: u64,
}

impl WorkerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn error_backoff(&self) -> Duration {
        Duration::from_millis(self.error_backoff_ms)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            count: 4,
            poll_interval_ms: 250,
            error_backoff_ms: 1_000,
            shutdown_grace_secs: 30,
        }
    }
}

/// Hard execution bounds for the external capabilities.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Port scans may legitimately run for minutes against slow targets.
    pub scan_timeout_secs: u64,
    /// Catalog lookups are local and should finish in seconds.
    pub lookup_timeout_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            scan_timeout_secs: 300,
            lookup_timeout_secs: 30,
        }
    }
}

/// Cadence and bounds for the background housekeeping task.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct HousekeepingConfig {
    /// How often the housekeeper sweeps for stale work (seconds).
    pub interval_secs: u64,
    /// Unacknowledged deliveries older than this are requeued, and jobs
    /// stuck in `processing` this long are failed. Must exceed the largest
    /// capability timeout or live workers would be swept mid-run.
    pub stale_after_secs: u64,
}

impl HousekeepingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn stale_after(&self) -> Duration {
        Duration::from_secs(self.stale_after_secs)
    }
}

impl Default for HousekeepingConfig {
    fn default() -> Self {
        Self {
            interval_secs: 60,
            stale_after_secs: 900,
        }
    }
}

/// Score boundaries mapping a 0-100 risk score onto a category.
///
/// Each bound is inclusive: a score equal to `critical` is critical.
/// Scores below `low_floor` are `very-low`.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct CategoryThresholds {
    pub critical: f64,
    pub high: f64,
    pub medium: f64,
    pub low_floor: f64,
}

impl Default for CategoryThresholds {
    fn default() -> Self {
        Self {
            critical: 75.0,
            high: 50.0,
            medium: 25.0,
            low_floor: 10.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_internally_consistent() {
        let config = PipelineConfig::default();
        assert!(config.workers.count >= 1);
        assert!(
            config.housekeeping.stale_after_secs > config.timeouts.scan_timeout_secs,
            "stale sweep must not reclaim live scans"
        );
        let t = config.thresholds;
        assert!(t.critical > t.high && t.high > t.medium && t.medium > t.low_floor);
    }

    #[test]
    fn per_kind_timeouts_differ() {
        let config = PipelineConfig::default();
        assert!(
            config.timeout_for(JobKind::NetworkScan)
                > config.timeout_for(JobKind::VulnerabilityLookup)
        );
    }

    #[test]
    fn partial_overrides_keep_remaining_defaults() {
        let config: PipelineConfig =
            serde_json::from_str(r#"{"workers": {"count": 2}}"#).expect("valid config json");
        assert_eq!(config.workers.count, 2);
        assert_eq!(config.workers.poll_interval_ms, 250);
        assert_eq!(config.timeouts.scan_timeout_secs, 300);
    }
}
