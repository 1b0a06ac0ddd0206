//! SQLite-backed job ledger.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rampart_model::{AssessmentReport, JobId, JobKind, JobRecord, JobState};
use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
};
use tracing::info;

use crate::error::{PipelineError, Result};
use crate::store::JobStore;

const SELECT_COLUMNS: &str =
    "id, target, kind, state, created_at, updated_at, attempts, processed_via, result, error";

/// Durable job ledger backed by SQLite.
///
/// All state transitions are expressed as conditional `UPDATE ... WHERE
/// state = ?` statements and decided by `rows_affected`, so two workers
/// racing on the same job resolve without any application-level lock.
#[derive(Clone)]
pub struct SqliteJobStore {
    pool: SqlitePool,
}

impl fmt::Debug for SqliteJobStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteJobStore")
            .field("pool_size", &self.pool.size())
            .field("idle_connections", &self.pool.num_idle())
            .finish()
    }
}

#[derive(sqlx::FromRow)]
struct JobRow {
    id: String,
    target: String,
    kind: String,
    state: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    attempts: i64,
    processed_via: Option<String>,
    result: Option<String>,
    error: Option<String>,
}

impl TryFrom<JobRow> for JobRecord {
    type Error = PipelineError;

    fn try_from(row: JobRow) -> Result<JobRecord> {
        let id = JobId::from_str(&row.id)
            .map_err(|e| PipelineError::Internal(format!("corrupt job id '{}': {e}", row.id)))?;
        let kind: JobKind = row.kind.parse().map_err(PipelineError::Internal)?;
        let status: JobState = row.state.parse().map_err(PipelineError::Internal)?;
        let result = row.result.as_deref().map(serde_json::from_str).transpose()?;

        Ok(JobRecord {
            id,
            target: row.target,
            kind,
            status,
            created_at: row.created_at,
            updated_at: row.updated_at,
            attempts: row.attempts,
            processed_via: row.processed_via,
            result,
            error: row.error,
        })
    }
}

impl SqliteJobStore {
    /// Open (creating if missing) the database at `database_url`, run
    /// migrations, and verify connectivity.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        // An in-memory database exists per connection; a single pooled
        // connection keeps the schema visible across calls.
        let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(30))
            .connect_with(options)
            .await?;

        crate::MIGRATOR
            .run(&pool)
            .await
            .map_err(|e| PipelineError::Internal(format!("Migration failed: {e}")))?;

        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&pool)
            .await?;
        info!(url = %database_url, "Job store connected and schema verified");

        Ok(Self { pool })
    }
}

#[async_trait]
impl JobStore for SqliteJobStore {
    async fn insert(&self, record: &JobRecord) -> Result<()> {
        let result_json = record
            .result
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        sqlx::query(
            "INSERT INTO jobs (id, target, kind, state, created_at, updated_at, attempts, \
             processed_via, result, error) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(record.id.to_string())
        .bind(&record.target)
        .bind(record.kind.as_str())
        .bind(record.status.as_str())
        .bind(record.created_at)
        .bind(record.updated_at)
        .bind(record.attempts)
        .bind(&record.processed_via)
        .bind(result_json)
        .bind(&record.error)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn fetch(&self, id: JobId) -> Result<JobRecord> {
        let row: Option<JobRow> =
            sqlx::query_as(&format!("SELECT {SELECT_COLUMNS} FROM jobs WHERE id = ?"))
                .bind(id.to_string())
                .fetch_optional(&self.pool)
                .await?;

        row.map(JobRecord::try_from)
            .transpose()?
            .ok_or_else(|| PipelineError::NotFound(id.to_string()))
    }

    async fn list_recent(&self, limit: u32) -> Result<Vec<JobRecord>> {
        let rows: Vec<JobRow> = sqlx::query_as(&format!(
            "SELECT {SELECT_COLUMNS} FROM jobs ORDER BY created_at DESC LIMIT ?"
        ))
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(JobRecord::try_from).collect()
    }

    async fn claim(&self, id: JobId, worker: &str) -> Result<Option<JobRecord>> {
        let updated = sqlx::query(
            "UPDATE jobs SET state = 'processing', processed_via = ?, \
             attempts = attempts + 1, updated_at = ? \
             WHERE id = ? AND state = 'queued'",
        )
        .bind(worker)
        .bind(Utc::now())
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        if updated.rows_affected() == 0 {
            return Ok(None);
        }

        self.fetch(id).await.map(Some)
    }

    async fn complete(&self, id: JobId, report: &AssessmentReport) -> Result<bool> {
        let result_json = serde_json::to_string(report)?;

        let updated = sqlx::query(
            "UPDATE jobs SET state = 'completed', result = ?, updated_at = ? \
             WHERE id = ? AND state = 'processing'",
        )
        .bind(result_json)
        .bind(Utc::now())
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        Ok(updated.rows_affected() == 1)
    }

    async fn fail(&self, id: JobId, error: &str) -> Result<bool> {
        let updated = sqlx::query(
            "UPDATE jobs SET state = 'failed', error = ?, updated_at = ? \
             WHERE id = ? AND state = 'processing'",
        )
        .bind(error)
        .bind(Utc::now())
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        Ok(updated.rows_affected() == 1)
    }

    async fn abort_dispatch(&self, id: JobId, error: &str) -> Result<bool> {
        let updated = sqlx::query(
            "UPDATE jobs SET state = 'failed', error = ?, updated_at = ? \
             WHERE id = ? AND state = 'queued'",
        )
        .bind(error)
        .bind(Utc::now())
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;

        Ok(updated.rows_affected() == 1)
    }

    async fn count_in_state(&self, state: JobState) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM jobs WHERE state = ?")
            .bind(state.as_str())
            .fetch_one(&self.pool)
            .await?;

        Ok(count.max(0) as u64)
    }

    async fn fail_stale(&self, older_than: Duration) -> Result<u64> {
        let cutoff = Utc::now() - chrono::Duration::seconds(older_than.as_secs() as i64);

        let updated = sqlx::query(
            "UPDATE jobs SET state = 'failed', \
             error = 'processing lease expired; worker presumed dead', updated_at = ? \
             WHERE state = 'processing' AND updated_at < ?",
        )
        .bind(Utc::now())
        .bind(cutoff)
        .execute(&self.pool)
        .await?;

        Ok(updated.rows_affected())
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CategoryThresholds;
    use crate::scoring;
    use rampart_model::Finding;

    async fn memory_store() -> SqliteJobStore {
        SqliteJobStore::connect("sqlite::memory:")
            .await
            .expect("in-memory store")
    }

    fn sample_report() -> AssessmentReport {
        let finding = Finding::new(
            "22/tcp",
            "OpenSSH",
            rampart_model::Exposure::Internal,
            "remote-access",
        )
        .with_severity(5.0);
        scoring::assess_findings(
            JobKind::NetworkScan,
            vec![finding],
            &CategoryThresholds::default(),
        )
    }

    #[tokio::test]
    async fn insert_and_fetch_round_trip() {
        let store = memory_store().await;
        let record = JobRecord::queued("scanme.example", JobKind::NetworkScan);
        store.insert(&record).await.expect("insert");

        let fetched = store.fetch(record.id).await.expect("fetch");
        assert_eq!(fetched.id, record.id);
        assert_eq!(fetched.target, "scanme.example");
        assert_eq!(fetched.kind, JobKind::NetworkScan);
        assert_eq!(fetched.status, JobState::Queued);
        assert!(fetched.result.is_none());
    }

    #[tokio::test]
    async fn fetch_unknown_id_is_not_found() {
        let store = memory_store().await;
        let err = store.fetch(JobId::new()).await.unwrap_err();
        assert!(matches!(err, PipelineError::NotFound(_)));
    }

    #[tokio::test]
    async fn claim_transitions_and_stamps_worker() {
        let store = memory_store().await;
        let record = JobRecord::queued("10.0.0.1", JobKind::NetworkScan);
        store.insert(&record).await.expect("insert");

        let claimed = store
            .claim(record.id, "worker-0")
            .await
            .expect("claim")
            .expect("claim won");
        assert_eq!(claimed.status, JobState::Processing);
        assert_eq!(claimed.attempts, 1);
        assert_eq!(claimed.processed_via.as_deref(), Some("worker-0"));
    }

    #[tokio::test]
    async fn second_claim_is_a_no_op() {
        let store = memory_store().await;
        let record = JobRecord::queued("10.0.0.1", JobKind::NetworkScan);
        store.insert(&record).await.expect("insert");

        assert!(store.claim(record.id, "a").await.expect("claim").is_some());
        assert!(store.claim(record.id, "b").await.expect("claim").is_none());

        let after = store.fetch(record.id).await.expect("fetch");
        assert_eq!(after.attempts, 1, "losing claim must not touch the row");
        assert_eq!(after.processed_via.as_deref(), Some("a"));
    }

    #[tokio::test]
    async fn racing_claims_yield_exactly_one_owner() {
        let store = memory_store().await;
        let record = JobRecord::queued("10.0.0.9", JobKind::NetworkScan);
        store.insert(&record).await.expect("insert");

        let (first, second) =
            tokio::join!(store.claim(record.id, "a"), store.claim(record.id, "b"));
        let wins =
            usize::from(first.expect("claim a").is_some()) + usize::from(second.expect("claim b").is_some());
        assert_eq!(wins, 1);
    }

    #[tokio::test]
    async fn complete_is_only_legal_from_processing() {
        let store = memory_store().await;
        let record = JobRecord::queued("redis", JobKind::VulnerabilityLookup);
        store.insert(&record).await.expect("insert");
        let report = sample_report();

        assert!(
            !store.complete(record.id, &report).await.expect("complete"),
            "queued job must not skip processing"
        );

        store.claim(record.id, "w").await.expect("claim");
        assert!(store.complete(record.id, &report).await.expect("complete"));

        let done = store.fetch(record.id).await.expect("fetch");
        assert_eq!(done.status, JobState::Completed);
        assert!(done.result.is_some());
        assert!(done.error.is_none());

        // Terminal states are sticky.
        assert!(!store.complete(record.id, &report).await.expect("complete"));
        assert!(!store.fail(record.id, "late").await.expect("fail"));
    }

    #[tokio::test]
    async fn fail_records_error_from_processing() {
        let store = memory_store().await;
        let record = JobRecord::queued("redis", JobKind::VulnerabilityLookup);
        store.insert(&record).await.expect("insert");
        store.claim(record.id, "w").await.expect("claim");

        assert!(store.fail(record.id, "capability exploded").await.expect("fail"));

        let failed = store.fetch(record.id).await.expect("fetch");
        assert_eq!(failed.status, JobState::Failed);
        assert_eq!(failed.error.as_deref(), Some("capability exploded"));
        assert!(failed.result.is_none());
    }

    #[tokio::test]
    async fn abort_dispatch_only_touches_queued_jobs() {
        let store = memory_store().await;
        let record = JobRecord::queued("redis", JobKind::VulnerabilityLookup);
        store.insert(&record).await.expect("insert");

        assert!(
            store
                .abort_dispatch(record.id, "publish failed")
                .await
                .expect("abort")
        );
        let aborted = store.fetch(record.id).await.expect("fetch");
        assert_eq!(aborted.status, JobState::Failed);
        assert_eq!(aborted.error.as_deref(), Some("publish failed"));

        let claimed = JobRecord::queued("nginx", JobKind::VulnerabilityLookup);
        store.insert(&claimed).await.expect("insert");
        store.claim(claimed.id, "w").await.expect("claim");
        assert!(
            !store
                .abort_dispatch(claimed.id, "late publish error")
                .await
                .expect("abort"),
            "claimed jobs are owned by their worker"
        );
    }

    #[tokio::test]
    async fn list_recent_orders_newest_first() {
        let store = memory_store().await;
        for age_secs in [30, 10, 20] {
            let mut record = JobRecord::queued(format!("host-{age_secs}"), JobKind::NetworkScan);
            record.created_at = Utc::now() - chrono::Duration::seconds(age_secs);
            record.updated_at = record.created_at;
            store.insert(&record).await.expect("insert");
        }

        let recent = store.list_recent(2).await.expect("list");
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].target, "host-10");
        assert_eq!(recent[1].target, "host-20");
    }

    #[tokio::test]
    async fn counts_jobs_per_state() {
        let store = memory_store().await;
        let queued = JobRecord::queued("a.example", JobKind::NetworkScan);
        let claimed = JobRecord::queued("b.example", JobKind::NetworkScan);
        store.insert(&queued).await.expect("insert");
        store.insert(&claimed).await.expect("insert");
        store.claim(claimed.id, "w").await.expect("claim");

        assert_eq!(store.count_in_state(JobState::Queued).await.expect("count"), 1);
        assert_eq!(
            store.count_in_state(JobState::Processing).await.expect("count"),
            1
        );
        assert_eq!(store.count_in_state(JobState::Failed).await.expect("count"), 0);
    }

    #[tokio::test]
    async fn fail_stale_sweeps_only_abandoned_jobs() {
        let store = memory_store().await;

        let abandoned = JobRecord::queued("dead.example", JobKind::NetworkScan);
        store.insert(&abandoned).await.expect("insert");
        store.claim(abandoned.id, "w0").await.expect("claim");
        // Backdate the claim far past the stale bound.
        sqlx::query("UPDATE jobs SET updated_at = ? WHERE id = ?")
            .bind(Utc::now() - chrono::Duration::seconds(3_600))
            .bind(abandoned.id.to_string())
            .execute(&store.pool)
            .await
            .expect("backdate");

        let live = JobRecord::queued("live.example", JobKind::NetworkScan);
        store.insert(&live).await.expect("insert");
        store.claim(live.id, "w1").await.expect("claim");

        let swept = store
            .fail_stale(Duration::from_secs(900))
            .await
            .expect("fail_stale");
        assert_eq!(swept, 1);

        let dead = store.fetch(abandoned.id).await.expect("fetch");
        assert_eq!(dead.status, JobState::Failed);
        assert!(dead.error.as_deref().unwrap_or_default().contains("expired"));

        let alive = store.fetch(live.id).await.expect("fetch");
        assert_eq!(alive.status, JobState::Processing);
    }

    #[tokio::test]
    async fn completed_job_reads_are_byte_identical() {
        let store = memory_store().await;
        let record = JobRecord::queued("openssl", JobKind::VulnerabilityLookup);
        store.insert(&record).await.expect("insert");
        store.claim(record.id, "w").await.expect("claim");
        store
            .complete(record.id, &sample_report())
            .await
            .expect("complete");

        let first = store.fetch(record.id).await.expect("fetch");
        let second = store.fetch(record.id).await.expect("fetch");
        let first_json = serde_json::to_string(&first).expect("serialize");
        let second_json = serde_json::to_string(&second).expect("serialize");
        assert_eq!(first_json, second_json);
    }
}
