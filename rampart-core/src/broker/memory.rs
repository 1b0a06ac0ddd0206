//! In-process queue backend.

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::{Mutex, Notify};
use tracing::debug;

use crate::broker::{Delivery, QueueBroker, QueueMessage};
use crate::error::{PipelineError, Result};

struct PendingDelivery {
    message: QueueMessage,
    delivered_at: Instant,
}

/// Queue broker living entirely inside one process.
///
/// Deliveries stay tracked until acknowledged; [`QueueBroker::recover_stale`]
/// requeues anything a crashed consumer left behind, preserving at-least-once
/// semantics without an external service.
#[derive(Default)]
pub struct InProcessBroker {
    ready: Mutex<VecDeque<QueueMessage>>,
    in_flight: DashMap<u64, PendingDelivery>,
    notify: Notify,
    sequence: AtomicU64,
}

impl fmt::Debug for InProcessBroker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ready = self
            .ready
            .try_lock()
            .map(|queue| queue.len())
            .unwrap_or_default();

        f.debug_struct("InProcessBroker")
            .field("ready", &ready)
            .field("in_flight", &self.in_flight.len())
            .finish()
    }
}

impl InProcessBroker {
    pub fn new() -> Self {
        Self::default()
    }

    async fn try_receive(&self) -> Option<Delivery> {
        let message = self.ready.lock().await.pop_front()?;
        let token = self.sequence.fetch_add(1, Ordering::Relaxed);
        self.in_flight.insert(
            token,
            PendingDelivery {
                message,
                delivered_at: Instant::now(),
            },
        );
        Some(Delivery {
            message,
            token: token.to_string(),
        })
    }
}

#[async_trait]
impl QueueBroker for InProcessBroker {
    async fn publish(&self, message: &QueueMessage) -> Result<()> {
        self.ready.lock().await.push_back(*message);
        self.notify.notify_one();
        Ok(())
    }

    async fn receive(&self, wait: Duration) -> Result<Option<Delivery>> {
        let deadline = tokio::time::Instant::now() + wait;
        loop {
            if let Some(delivery) = self.try_receive().await {
                return Ok(Some(delivery));
            }

            let notified = self.notify.notified();
            // Re-check after registering interest so a publish racing with
            // the empty check cannot be missed.
            if let Some(delivery) = self.try_receive().await {
                return Ok(Some(delivery));
            }

            tokio::select! {
                _ = notified => {}
                _ = tokio::time::sleep_until(deadline) => return Ok(None),
            }
        }
    }

    async fn ack(&self, delivery: &Delivery) -> Result<()> {
        let token: u64 = delivery
            .token
            .parse()
            .map_err(|_| PipelineError::Queue(format!("malformed ack token: {}", delivery.token)))?;
        // Removing an already-acknowledged token is a no-op; duplicate acks
        // are tolerated just like duplicate deliveries.
        self.in_flight.remove(&token);
        Ok(())
    }

    async fn depth(&self) -> Result<u64> {
        Ok(self.ready.lock().await.len() as u64)
    }

    async fn in_flight(&self) -> Result<u64> {
        Ok(self.in_flight.len() as u64)
    }

    async fn recover_stale(&self, older_than: Duration) -> Result<u64> {
        let stale: Vec<u64> = self
            .in_flight
            .iter()
            .filter(|entry| entry.value().delivered_at.elapsed() >= older_than)
            .map(|entry| *entry.key())
            .collect();

        let mut recovered = 0u64;
        {
            let mut ready = self.ready.lock().await;
            for token in stale {
                if let Some((_, pending)) = self.in_flight.remove(&token) {
                    ready.push_back(pending.message);
                    recovered += 1;
                }
            }
        }

        if recovered > 0 {
            debug!(recovered, "requeued stale deliveries");
            self.notify.notify_waiters();
        }
        Ok(recovered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rampart_model::JobId;

    fn message() -> QueueMessage {
        QueueMessage { job_id: JobId::new() }
    }

    #[tokio::test]
    async fn delivers_in_publish_order() {
        let broker = InProcessBroker::new();
        let first = message();
        let second = message();
        broker.publish(&first).await.expect("publish");
        broker.publish(&second).await.expect("publish");

        let a = broker
            .receive(Duration::from_millis(50))
            .await
            .expect("receive")
            .expect("delivery");
        let b = broker
            .receive(Duration::from_millis(50))
            .await
            .expect("receive")
            .expect("delivery");
        assert_eq!(a.message, first);
        assert_eq!(b.message, second);
    }

    #[tokio::test]
    async fn empty_queue_returns_none_after_wait() {
        let broker = InProcessBroker::new();
        let outcome = broker
            .receive(Duration::from_millis(20))
            .await
            .expect("receive");
        assert!(outcome.is_none());
    }

    #[tokio::test]
    async fn ack_retires_the_delivery() {
        let broker = InProcessBroker::new();
        broker.publish(&message()).await.expect("publish");

        let delivery = broker
            .receive(Duration::from_millis(50))
            .await
            .expect("receive")
            .expect("delivery");
        assert_eq!(broker.in_flight().await.expect("gauge"), 1);

        broker.ack(&delivery).await.expect("ack");
        assert_eq!(broker.in_flight().await.expect("gauge"), 0);
        assert_eq!(broker.depth().await.expect("depth"), 0);
        assert_eq!(
            broker.recover_stale(Duration::ZERO).await.expect("recover"),
            0,
            "acknowledged deliveries must not be requeued"
        );
    }

    #[tokio::test]
    async fn double_ack_is_idempotent() {
        let broker = InProcessBroker::new();
        broker.publish(&message()).await.expect("publish");
        let delivery = broker
            .receive(Duration::from_millis(50))
            .await
            .expect("receive")
            .expect("delivery");

        broker.ack(&delivery).await.expect("first ack");
        broker.ack(&delivery).await.expect("second ack");
    }

    #[tokio::test]
    async fn unacknowledged_delivery_is_redelivered_after_recovery() {
        let broker = InProcessBroker::new();
        let original = message();
        broker.publish(&original).await.expect("publish");

        let delivery = broker
            .receive(Duration::from_millis(50))
            .await
            .expect("receive")
            .expect("delivery");
        drop(delivery); // consumer dies without acking

        let recovered = broker
            .recover_stale(Duration::ZERO)
            .await
            .expect("recover");
        assert_eq!(recovered, 1);

        let redelivered = broker
            .receive(Duration::from_millis(50))
            .await
            .expect("receive")
            .expect("redelivery");
        assert_eq!(redelivered.message, original);
    }

    #[tokio::test]
    async fn blocked_receive_wakes_on_publish() {
        let broker = std::sync::Arc::new(InProcessBroker::new());
        let consumer = {
            let broker = std::sync::Arc::clone(&broker);
            tokio::spawn(async move { broker.receive(Duration::from_secs(5)).await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        let published = message();
        broker.publish(&published).await.expect("publish");

        let delivery = tokio::time::timeout(Duration::from_secs(1), consumer)
            .await
            .expect("woke before the full wait")
            .expect("join")
            .expect("receive")
            .expect("delivery");
        assert_eq!(delivery.message, published);
    }
}
