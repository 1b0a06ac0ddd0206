//! Runtime start/stop control for the consumer pool.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tokio::sync::Notify;

/// Shared on/off switch for the worker pool.
///
/// Workers gate each receive cycle on
/// [`ConsumerController::wait_until_running`]; flipping the switch off only
/// stops new deliveries from being taken. Jobs already claimed keep running
/// to their terminal state, so a stop is a drain, never an abort.
#[derive(Clone)]
pub struct ConsumerController {
    inner: Arc<ControllerInner>,
}

struct ControllerInner {
    running: AtomicBool,
    in_flight: AtomicU64,
    resume: Notify,
}

impl fmt::Debug for ConsumerController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConsumerController")
            .field("running", &self.is_running())
            .field("in_flight", &self.in_flight())
            .finish()
    }
}

impl Default for ConsumerController {
    fn default() -> Self {
        Self::new(true)
    }
}

impl ConsumerController {
    /// New controller. `running` decides whether workers consume
    /// immediately or sit idle until an explicit [`start`](Self::start).
    pub fn new(running: bool) -> Self {
        Self {
            inner: Arc::new(ControllerInner {
                running: AtomicBool::new(running),
                in_flight: AtomicU64::new(0),
                resume: Notify::new(),
            }),
        }
    }

    /// Enable consumption, waking any idle workers. Returns whether this
    /// call changed the state; a second start is a no-op.
    pub fn start(&self) -> bool {
        let changed = !self.inner.running.swap(true, Ordering::SeqCst);
        if changed {
            self.inner.resume.notify_waiters();
        }
        changed
    }

    /// Disable consumption of further deliveries. Returns whether this
    /// call changed the state; a second stop is a no-op.
    pub fn stop(&self) -> bool {
        self.inner.running.swap(false, Ordering::SeqCst)
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    /// Jobs some worker is processing right now.
    pub fn in_flight(&self) -> u64 {
        self.inner.in_flight.load(Ordering::SeqCst)
    }

    /// Wait until consumption is enabled.
    ///
    /// The wakeup is registered before the flag is re-checked, so a
    /// `start` racing with this call cannot be lost.
    pub async fn wait_until_running(&self) {
        loop {
            if self.is_running() {
                return;
            }
            let resumed = self.inner.resume.notified();
            if self.is_running() {
                return;
            }
            resumed.await;
        }
    }

    /// Mark one job as in flight for the lifetime of the returned guard.
    pub fn begin_job(&self) -> InFlightGuard {
        self.inner.in_flight.fetch_add(1, Ordering::SeqCst);
        InFlightGuard {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Decrements the in-flight gauge when dropped, however the job ended.
pub struct InFlightGuard {
    inner: Arc<ControllerInner>,
}

impl fmt::Debug for InFlightGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InFlightGuard").finish_non_exhaustive()
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.inner.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    #[test]
    fn start_and_stop_report_whether_state_changed() {
        let controller = ConsumerController::new(false);
        assert!(!controller.is_running());

        assert!(controller.start());
        assert!(!controller.start());
        assert!(controller.is_running());

        assert!(controller.stop());
        assert!(!controller.stop());
        assert!(!controller.is_running());
    }

    #[test]
    fn clones_share_the_same_switch() {
        let controller = ConsumerController::default();
        let other = controller.clone();
        controller.stop();
        assert!(!other.is_running());
    }

    #[test]
    fn in_flight_gauge_follows_guard_lifetimes() {
        let controller = ConsumerController::default();
        assert_eq!(controller.in_flight(), 0);

        let first = controller.begin_job();
        let second = controller.begin_job();
        assert_eq!(controller.in_flight(), 2);

        drop(first);
        assert_eq!(controller.in_flight(), 1);
        drop(second);
        assert_eq!(controller.in_flight(), 0);
    }

    #[tokio::test]
    async fn wait_until_running_blocks_while_stopped() {
        let controller = ConsumerController::new(false);
        let waited = timeout(Duration::from_millis(50), controller.wait_until_running()).await;
        assert!(waited.is_err(), "must still be blocked while stopped");
    }

    #[tokio::test]
    async fn start_wakes_a_blocked_waiter() {
        let controller = ConsumerController::new(false);
        let waiter = {
            let controller = controller.clone();
            tokio::spawn(async move { controller.wait_until_running().await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        controller.start();
        timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter must be released")
            .expect("waiter task must not panic");
    }

    #[tokio::test]
    async fn wait_returns_immediately_when_already_running() {
        let controller = ConsumerController::default();
        timeout(Duration::from_millis(50), controller.wait_until_running())
            .await
            .expect("must not block while running");
    }
}
