//! At-least-once delivery between the dispatcher and the worker pool.
//!
//! Two interchangeable backends: an in-process queue for single-node
//! deployments and tests, and a Redis-backed queue for running workers in
//! separate processes. Both may redeliver; neither is trusted to decide
//! ownership. The job store's claim step does that.

pub mod memory;
pub mod redis;

pub use memory::InProcessBroker;
pub use redis::RedisBroker;

use std::time::Duration;

use async_trait::async_trait;
use rampart_model::JobId;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Wire payload between dispatcher and workers.
///
/// Carries the job id and nothing else: the job store stays authoritative,
/// so a redelivered message can never disagree with job state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueMessage {
    pub job_id: JobId,
}

/// One received message plus the opaque token needed to acknowledge it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub message: QueueMessage,
    /// Backend-specific acknowledgement handle. Never parsed by consumers.
    pub token: String,
}

/// Abstracts the delivery channel between submission and the worker pool.
#[async_trait]
pub trait QueueBroker: Send + Sync {
    /// Enqueue one message. At-least-once: the message survives until a
    /// consumer acknowledges it.
    async fn publish(&self, message: &QueueMessage) -> Result<()>;

    /// Wait up to `wait` for the next delivery. `None` means the queue
    /// stayed empty for the whole window, which is not an error.
    async fn receive(&self, wait: Duration) -> Result<Option<Delivery>>;

    /// Acknowledge a delivery, removing it permanently.
    async fn ack(&self, delivery: &Delivery) -> Result<()>;

    /// Messages currently queued and not yet delivered.
    async fn depth(&self) -> Result<u64>;

    /// Deliveries handed to a consumer but not yet acknowledged.
    async fn in_flight(&self) -> Result<u64>;

    /// Requeue deliveries that have gone unacknowledged for longer than
    /// `older_than` (their consumer presumably died), returning how many
    /// were recovered.
    async fn recover_stale(&self, older_than: Duration) -> Result<u64>;
}
