//! Redis-backed queue backend.
//!
//! Reliable-queue layout: one list of ready payloads, one list of unacked
//! payloads, and a sorted set scoring each unacked payload by delivery
//! time. `receive` moves a payload atomically between the lists, `ack`
//! deletes it, and `recover_stale` requeues entries whose consumer never
//! acknowledged them.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use redis::{AsyncCommands, Direction, aio::ConnectionManager};
use tracing::{debug, info};

use crate::broker::{Delivery, QueueBroker, QueueMessage};
use crate::error::{PipelineError, Result};

/// Queue broker backed by a shared Redis instance, for deployments where
/// the worker pool runs in separate processes from the API.
#[derive(Clone)]
pub struct RedisBroker {
    conn: ConnectionManager,
    ready_key: String,
    unacked_key: String,
    pending_key: String,
}

impl fmt::Debug for RedisBroker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisBroker")
            .field("ready_key", &self.ready_key)
            .field("unacked_key", &self.unacked_key)
            .finish()
    }
}

impl RedisBroker {
    /// Connect to `redis_url` and namespace all keys under `namespace`.
    pub async fn connect(redis_url: &str, namespace: &str) -> Result<Self> {
        info!(url = %redis_url, "Connecting to Redis queue broker");

        let client = redis::Client::open(redis_url)
            .map_err(|e| PipelineError::Queue(format!("Failed to create Redis client: {e}")))?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| PipelineError::Queue(format!("Failed to connect to Redis: {e}")))?;

        let broker = Self {
            conn,
            ready_key: format!("{namespace}:ready"),
            unacked_key: format!("{namespace}:unacked"),
            pending_key: format!("{namespace}:pending"),
        };

        let mut probe = broker.conn.clone();
        redis::cmd("PING")
            .query_async::<String>(&mut probe)
            .await
            .map_err(|e| PipelineError::Queue(format!("Redis health check failed: {e}")))?;
        info!("Queue broker connected to Redis");

        Ok(broker)
    }
}

#[async_trait]
impl QueueBroker for RedisBroker {
    async fn publish(&self, message: &QueueMessage) -> Result<()> {
        let payload = serde_json::to_string(message)?;
        let mut conn = self.conn.clone();
        let _: i64 = conn.lpush(&self.ready_key, &payload).await?;
        Ok(())
    }

    async fn receive(&self, wait: Duration) -> Result<Option<Delivery>> {
        let mut conn = self.conn.clone();

        // Non-blocking move keeps the shared multiplexed connection free
        // for publishes and acks; the worker loop provides the cadence.
        let moved: Option<String> = conn
            .lmove(
                &self.ready_key,
                &self.unacked_key,
                Direction::Right,
                Direction::Left,
            )
            .await?;

        let Some(payload) = moved else {
            tokio::time::sleep(wait).await;
            return Ok(None);
        };

        let _: i64 = conn
            .zadd(&self.pending_key, &payload, Utc::now().timestamp())
            .await?;

        let message: QueueMessage = serde_json::from_str(&payload)?;
        Ok(Some(Delivery {
            message,
            token: payload,
        }))
    }

    async fn ack(&self, delivery: &Delivery) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: i64 = conn.lrem(&self.unacked_key, 1, &delivery.token).await?;
        let _: i64 = conn.zrem(&self.pending_key, &delivery.token).await?;
        Ok(())
    }

    async fn depth(&self) -> Result<u64> {
        let mut conn = self.conn.clone();
        let depth: i64 = conn.llen(&self.ready_key).await?;
        Ok(depth.max(0) as u64)
    }

    async fn in_flight(&self) -> Result<u64> {
        let mut conn = self.conn.clone();
        let in_flight: i64 = conn.llen(&self.unacked_key).await?;
        Ok(in_flight.max(0) as u64)
    }

    async fn recover_stale(&self, older_than: Duration) -> Result<u64> {
        let cutoff = Utc::now().timestamp() - older_than.as_secs() as i64;
        let mut conn = self.conn.clone();

        let stale: Vec<String> = conn
            .zrangebyscore(&self.pending_key, "-inf", cutoff)
            .await?;

        let mut recovered = 0u64;
        for payload in stale {
            // A concurrent ack wins the LREM; only requeue what we removed.
            let removed: i64 = conn.lrem(&self.unacked_key, 1, &payload).await?;
            let _: i64 = conn.zrem(&self.pending_key, &payload).await?;
            if removed > 0 {
                let _: i64 = conn.lpush(&self.ready_key, &payload).await?;
                recovered += 1;
            }
        }

        if recovered > 0 {
            debug!(recovered, "requeued stale deliveries");
        }
        Ok(recovered)
    }
}
