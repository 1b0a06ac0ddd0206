//! Worker pool that drives queued jobs to their terminal state.
//!
//! Each worker loops on receive, claims the delivered job through the
//! store's conditional transition, runs the matching capability under a
//! hard timeout, scores the findings, and writes exactly one terminal
//! state. A housekeeper task sweeps both layers of staleness: deliveries
//! whose consumer died before acknowledging, and jobs whose claiming
//! worker died mid-processing.

use std::fmt;
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::broker::{Delivery, QueueBroker};
use crate::capability::CapabilityRegistry;
use crate::config::PipelineConfig;
use crate::controller::ConsumerController;
use crate::error::{PipelineError, Result};
use crate::scoring::assess_findings;
use crate::store::JobStore;

/// Supervises the consumer workers and the housekeeper inside one process.
pub struct WorkerRuntime {
    config: PipelineConfig,
    store: Arc<dyn JobStore>,
    broker: Arc<dyn QueueBroker>,
    capabilities: Arc<CapabilityRegistry>,
    controller: ConsumerController,
    shutdown_token: CancellationToken,
    worker_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl fmt::Debug for WorkerRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let worker_handle_count = self
            .worker_handles
            .try_lock()
            .map(|handles| handles.len())
            .unwrap_or_default();

        f.debug_struct("WorkerRuntime")
            .field("config", &self.config)
            .field("capabilities", &self.capabilities)
            .field("controller", &self.controller)
            .field("worker_handle_count", &worker_handle_count)
            .field("shutdown_cancelled", &self.shutdown_token.is_cancelled())
            .finish()
    }
}

impl WorkerRuntime {
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn store(&self) -> Arc<dyn JobStore> {
        Arc::clone(&self.store)
    }

    pub fn broker(&self) -> Arc<dyn QueueBroker> {
        Arc::clone(&self.broker)
    }

    pub fn capabilities(&self) -> Arc<CapabilityRegistry> {
        Arc::clone(&self.capabilities)
    }

    pub fn controller(&self) -> ConsumerController {
        self.controller.clone()
    }

    /// Spawn the worker pool and the housekeeper. Idempotent in the sense
    /// that calling it twice simply adds more workers, which is never what
    /// callers want; call it once.
    pub async fn start(&self) {
        let worker_group = format!("assess-{}", std::process::id());
        for index in 0..self.config.workers.count {
            self.spawn_worker(format!("{worker_group}-w{index}")).await;
        }
        self.spawn_housekeeper().await;
        info!(
            workers = self.config.workers.count,
            running = self.controller.is_running(),
            "worker runtime started"
        );
    }

    async fn spawn_worker(&self, worker_id: String) {
        let config = self.config.clone();
        let store = Arc::clone(&self.store);
        let broker = Arc::clone(&self.broker);
        let capabilities = Arc::clone(&self.capabilities);
        let controller = self.controller.clone();
        let shutdown = self.shutdown_token.clone();

        let poll_interval = config.workers.poll_interval();
        let error_backoff = config.workers.error_backoff();

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        info!(worker = %worker_id, "worker shutting down");
                        break;
                    }
                    _ = controller.wait_until_running() => {}
                }

                let received = tokio::select! {
                    _ = shutdown.cancelled() => {
                        info!(worker = %worker_id, "worker shutting down");
                        break;
                    }
                    received = broker.receive(poll_interval) => received,
                };

                match received {
                    Ok(Some(delivery)) => {
                        process_delivery(
                            &worker_id,
                            &config,
                            &store,
                            &broker,
                            &capabilities,
                            &controller,
                            delivery,
                        )
                        .await;
                    }
                    Ok(None) => {}
                    Err(err) => {
                        warn!(worker = %worker_id, error = %err, "queue receive failed");
                        tokio::time::sleep(error_backoff).await;
                    }
                }
            }
        });

        let mut handles = self.worker_handles.lock().await;
        handles.push(handle);
    }

    async fn spawn_housekeeper(&self) {
        let store = Arc::clone(&self.store);
        let broker = Arc::clone(&self.broker);
        let interval = self.config.housekeeping.interval();
        let stale_after = self.config.housekeeping.stale_after();
        let shutdown = self.shutdown_token.clone();

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        info!("housekeeper shutting down");
                        break;
                    }
                    _ = tokio::time::sleep(interval) => {
                        match broker.recover_stale(stale_after).await {
                            Ok(0) => {}
                            Ok(recovered) => {
                                warn!(recovered, "requeued unacknowledged deliveries")
                            }
                            Err(err) => warn!(error = %err, "delivery recovery failed"),
                        }
                        match store.fail_stale(stale_after).await {
                            Ok(0) => {}
                            Ok(swept) => warn!(swept, "failed stale processing jobs"),
                            Err(err) => warn!(error = %err, "stale job sweep failed"),
                        }
                    }
                }
            }
        });

        let mut handles = self.worker_handles.lock().await;
        handles.push(handle);
    }

    /// Cancel every task and wait, bounded per task by the configured
    /// grace period. In-flight jobs that beat the grace period land their
    /// terminal write; anything slower is recovered by the housekeeping
    /// sweep after restart.
    pub async fn shutdown(&self) -> Result<()> {
        info!("shutting down worker runtime");
        self.shutdown_token.cancel();

        let handles = {
            let mut guard = self.worker_handles.lock().await;
            std::mem::take(&mut *guard)
        };

        let grace = self.config.workers.shutdown_grace();
        for handle in handles {
            match tokio::time::timeout(grace, handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!("worker task failed: {e:?}"),
                Err(_) => warn!("worker task timed out during shutdown"),
            }
        }

        info!("worker runtime shutdown complete");
        Ok(())
    }
}

/// Drive one delivery to its conclusion.
///
/// Acknowledgement discipline: the delivery is acked once the job can no
/// longer need it, which is after a terminal write or after losing the
/// claim. Store errors leave the delivery unacknowledged on purpose so the
/// recovery sweep can redeliver it.
async fn process_delivery(
    worker_id: &str,
    config: &PipelineConfig,
    store: &Arc<dyn JobStore>,
    broker: &Arc<dyn QueueBroker>,
    capabilities: &Arc<CapabilityRegistry>,
    controller: &ConsumerController,
    delivery: Delivery,
) {
    let job_id = delivery.message.job_id;

    let record = match store.claim(job_id, worker_id).await {
        Ok(Some(record)) => record,
        Ok(None) => {
            // Duplicate delivery, or the job is already terminal.
            debug!(worker = %worker_id, job_id = %job_id, "discarding delivery for unclaimable job");
            ack_delivery(broker, &delivery, worker_id).await;
            return;
        }
        Err(err) => {
            error!(worker = %worker_id, job_id = %job_id, error = %err, "claim failed");
            return;
        }
    };

    let _in_flight = controller.begin_job();
    info!(
        worker = %worker_id,
        job_id = %job_id,
        kind = %record.kind,
        target = %record.target,
        attempt = record.attempts,
        "processing job"
    );

    let outcome = match capabilities.get(record.kind) {
        Some(capability) => {
            let deadline = config.timeout_for(record.kind);
            match tokio::time::timeout(deadline, capability.execute(&record.target)).await {
                Ok(Ok(findings)) => Ok(assess_findings(record.kind, findings, &config.thresholds)),
                Ok(Err(err)) => Err(err),
                Err(_) => Err(PipelineError::Timeout(format!(
                    "capability {} timed out after {}s",
                    capability.name(),
                    deadline.as_secs()
                ))),
            }
        }
        None => Err(PipelineError::Capability(format!(
            "no capability registered for kind {}",
            record.kind
        ))),
    };

    let written = match &outcome {
        Ok(report) => store.complete(job_id, report).await,
        Err(err) => store.fail(job_id, &err.to_string()).await,
    };

    match written {
        Ok(true) => match &outcome {
            Ok(report) => info!(
                worker = %worker_id,
                job_id = %job_id,
                findings = report.findings.len(),
                score = report.aggregate_score,
                category = %report.aggregate_category,
                "job completed"
            ),
            Err(err) => {
                warn!(worker = %worker_id, job_id = %job_id, error = %err, "job failed")
            }
        },
        Ok(false) => warn!(
            worker = %worker_id,
            job_id = %job_id,
            "job left processing before its terminal write; result discarded"
        ),
        Err(err) => {
            error!(worker = %worker_id, job_id = %job_id, error = %err, "terminal write failed");
            return;
        }
    }

    ack_delivery(broker, &delivery, worker_id).await;
}

async fn ack_delivery(broker: &Arc<dyn QueueBroker>, delivery: &Delivery, worker_id: &str) {
    if let Err(err) = broker.ack(delivery).await {
        warn!(
            worker = %worker_id,
            error = %err,
            "ack failed; the delivery will be recovered and discarded later"
        );
    }
}

/// Helper for constructing a runtime with explicit dependencies.
pub struct WorkerRuntimeBuilder {
    config: PipelineConfig,
    store: Option<Arc<dyn JobStore>>,
    broker: Option<Arc<dyn QueueBroker>>,
    capabilities: Option<Arc<CapabilityRegistry>>,
    controller: Option<ConsumerController>,
}

impl fmt::Debug for WorkerRuntimeBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerRuntimeBuilder")
            .field("config", &self.config)
            .field("store_set", &self.store.is_some())
            .field("broker_set", &self.broker.is_some())
            .field("capabilities_set", &self.capabilities.is_some())
            .field("controller_set", &self.controller.is_some())
            .finish()
    }
}

impl WorkerRuntimeBuilder {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            store: None,
            broker: None,
            capabilities: None,
            controller: None,
        }
    }

    pub fn with_store(mut self, store: Arc<dyn JobStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_broker(mut self, broker: Arc<dyn QueueBroker>) -> Self {
        self.broker = Some(broker);
        self
    }

    pub fn with_capabilities(mut self, capabilities: Arc<CapabilityRegistry>) -> Self {
        self.capabilities = Some(capabilities);
        self
    }

    pub fn with_controller(mut self, controller: ConsumerController) -> Self {
        self.controller = Some(controller);
        self
    }

    /// Build the runtime. Capabilities default to the built-in registry,
    /// the controller to a running one.
    pub fn build(self) -> Result<WorkerRuntime> {
        let store = self
            .store
            .ok_or_else(|| PipelineError::Internal("store dependency missing".into()))?;
        let broker = self
            .broker
            .ok_or_else(|| PipelineError::Internal("broker dependency missing".into()))?;
        let capabilities = match self.capabilities {
            Some(capabilities) => capabilities,
            None => Arc::new(CapabilityRegistry::builtin()?),
        };
        let controller = self.controller.unwrap_or_default();

        Ok(WorkerRuntime {
            config: self.config,
            store,
            broker,
            capabilities,
            controller,
            shutdown_token: CancellationToken::new(),
            worker_handles: Mutex::new(Vec::new()),
        })
    }
}
