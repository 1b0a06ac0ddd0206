//! Job intake: validate, persist, enqueue.

use std::fmt;
use std::sync::Arc;

use rampart_model::{JobKind, JobRecord};
use tracing::{error, info};

use crate::broker::{QueueBroker, QueueMessage};
use crate::error::{PipelineError, Result};
use crate::store::JobStore;
use crate::target::validate_target;

/// Accepts submissions and turns them into queued work.
///
/// Ordering is store-first: the durable row is written before the queue
/// message, so a consumer can always resolve a delivery to a record. When
/// the publish fails after the insert, the row is parked as `failed`
/// rather than left `queued` with no delivery ever coming.
pub struct JobDispatcher {
    store: Arc<dyn JobStore>,
    broker: Arc<dyn QueueBroker>,
}

impl fmt::Debug for JobDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobDispatcher").finish_non_exhaustive()
    }
}

impl JobDispatcher {
    pub fn new(store: Arc<dyn JobStore>, broker: Arc<dyn QueueBroker>) -> Self {
        Self { store, broker }
    }

    /// Validate `target`, persist a queued record, and hand it to the
    /// broker. Returns the record exactly as persisted.
    pub async fn dispatch(&self, target: &str, kind: JobKind) -> Result<JobRecord> {
        let canonical = validate_target(target, kind)?;
        let record = JobRecord::queued(canonical, kind);
        self.store.insert(&record).await?;

        let message = QueueMessage { job_id: record.id };
        if let Err(publish_err) = self.broker.publish(&message).await {
            // The row exists but no delivery will ever arrive for it.
            if let Err(mark_err) = self
                .store
                .abort_dispatch(record.id, "queue publish failed; job was never deliverable")
                .await
            {
                error!(
                    job_id = %record.id,
                    error = %mark_err,
                    "could not park undeliverable job as failed"
                );
            }
            return Err(PipelineError::Dispatch(format!(
                "queue publish failed for job {}: {publish_err}",
                record.id
            )));
        }

        info!(
            job_id = %record.id,
            kind = %kind,
            target = %record.target,
            "job dispatched"
        );
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use async_trait::async_trait;
    use rampart_model::JobState;

    use crate::broker::memory::InProcessBroker;
    use crate::broker::Delivery;
    use crate::store::sqlite::SqliteJobStore;

    struct RefusingBroker;

    #[async_trait]
    impl QueueBroker for RefusingBroker {
        async fn publish(&self, _message: &QueueMessage) -> Result<()> {
            Err(PipelineError::Queue("connection reset by peer".into()))
        }

        async fn receive(&self, _wait: Duration) -> Result<Option<Delivery>> {
            Ok(None)
        }

        async fn ack(&self, _delivery: &Delivery) -> Result<()> {
            Ok(())
        }

        async fn depth(&self) -> Result<u64> {
            Ok(0)
        }

        async fn in_flight(&self) -> Result<u64> {
            Ok(0)
        }

        async fn recover_stale(&self, _older_than: Duration) -> Result<u64> {
            Ok(0)
        }
    }

    async fn memory_store() -> Arc<SqliteJobStore> {
        Arc::new(
            SqliteJobStore::connect("sqlite::memory:")
                .await
                .expect("in-memory store"),
        )
    }

    #[tokio::test]
    async fn dispatch_persists_then_enqueues() {
        let store = memory_store().await;
        let broker = Arc::new(InProcessBroker::new());
        let dispatcher = JobDispatcher::new(store.clone(), broker.clone());

        let record = dispatcher
            .dispatch("  192.168.1.10 ", JobKind::NetworkScan)
            .await
            .expect("dispatch");

        assert_eq!(record.target, "192.168.1.10");
        assert_eq!(record.status, JobState::Queued);

        let stored = store.fetch(record.id).await.expect("fetch");
        assert_eq!(stored.status, JobState::Queued);
        assert_eq!(stored.target, "192.168.1.10");

        assert_eq!(broker.depth().await.expect("depth"), 1);
        let delivery = broker
            .receive(Duration::from_millis(100))
            .await
            .expect("receive")
            .expect("one delivery waiting");
        assert_eq!(delivery.message.job_id, record.id);
    }

    #[tokio::test]
    async fn invalid_target_touches_neither_store_nor_queue() {
        let store = memory_store().await;
        let broker = Arc::new(InProcessBroker::new());
        let dispatcher = JobDispatcher::new(store.clone(), broker.clone());

        let err = dispatcher
            .dispatch("not a target!!", JobKind::NetworkScan)
            .await
            .expect_err("must be rejected");
        assert!(matches!(err, PipelineError::InvalidTarget(_)));

        assert_eq!(
            store.count_in_state(JobState::Queued).await.expect("count"),
            0
        );
        assert_eq!(broker.depth().await.expect("depth"), 0);
    }

    #[tokio::test]
    async fn publish_failure_parks_the_job_as_failed() {
        let store = memory_store().await;
        let dispatcher = JobDispatcher::new(store.clone(), Arc::new(RefusingBroker));

        let err = dispatcher
            .dispatch("openssl", JobKind::VulnerabilityLookup)
            .await
            .expect_err("publish must fail");
        assert!(matches!(err, PipelineError::Dispatch(_)));

        let recent = store.list_recent(10).await.expect("list");
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].status, JobState::Failed);
        let reason = recent[0].error.as_deref().expect("failure reason recorded");
        assert!(reason.contains("publish failed"));
    }
}
