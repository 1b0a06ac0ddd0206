//! Durable job records.

pub mod sqlite;

pub use sqlite::SqliteJobStore;

use std::time::Duration;

use async_trait::async_trait;
use rampart_model::{AssessmentReport, JobId, JobRecord, JobState};

use crate::error::Result;

/// Abstracts the durable job ledger consumed by the dispatcher, the worker
/// pool, and the status handlers.
///
/// Every mutation is conditional on the job's current state. That
/// compare-and-set discipline is what turns the broker's at-least-once
/// delivery into effectively-once processing: [`JobStore::claim`] is the
/// single arbiter of ownership, not the broker.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Persist a freshly queued record. Fails if the id already exists.
    async fn insert(&self, record: &JobRecord) -> Result<()>;

    /// Fetch one record; `NotFound` for unknown ids. Never mutates state.
    async fn fetch(&self, id: JobId) -> Result<JobRecord>;

    /// Most recently submitted records first, bounded by `limit`.
    async fn list_recent(&self, limit: u32) -> Result<Vec<JobRecord>>;

    /// Atomically transition `queued -> processing` and stamp the claiming
    /// worker. Returns the claimed record, or `None` when another worker
    /// already owns the job (duplicate delivery).
    async fn claim(&self, id: JobId, worker: &str) -> Result<Option<JobRecord>>;

    /// Terminal success write, valid only from `processing`. Returns
    /// whether this call performed the transition.
    async fn complete(&self, id: JobId, report: &AssessmentReport) -> Result<bool>;

    /// Terminal failure write, valid only from `processing`.
    async fn fail(&self, id: JobId, error: &str) -> Result<bool>;

    /// Fail a job that never left `queued` because its broker publish
    /// failed, so it cannot sit stuck forever. No-op if a worker claimed
    /// it in the meantime.
    async fn abort_dispatch(&self, id: JobId, error: &str) -> Result<bool>;

    /// Number of jobs currently in `state`.
    async fn count_in_state(&self, state: JobState) -> Result<u64>;

    /// Fail jobs stuck in `processing` longer than `older_than`, returning
    /// how many were swept. Covers workers that died mid-job; live workers
    /// are protected by keeping the bound above every capability timeout.
    async fn fail_stale(&self, older_than: Duration) -> Result<u64>;

    /// Cheap connectivity probe for health checks.
    async fn ping(&self) -> Result<()>;
}
