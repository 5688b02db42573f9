//! Work performed while an order is in `PROCESSING`.

use std::time::Duration;

use async_trait::async_trait;
use common::Order;

/// Default length of the simulated processing step.
pub const DEFAULT_PROCESSING_DELAY: Duration = Duration::from_secs(2);

/// The unit of work executed between the `PROCESSING` and `COMPLETED` writes.
///
/// It runs on the worker of the order's partition, so a slow step delays
/// later events on that partition only.
#[async_trait]
pub trait ProcessingWork: Send + Sync {
    /// Performs the work for `order`.
    async fn perform(&self, order: &Order);
}

/// Stands in for real fulfilment by waiting a fixed amount of time.
#[derive(Debug, Clone, Copy)]
pub struct SimulatedDelay {
    delay: Duration,
}

impl SimulatedDelay {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }
}

impl Default for SimulatedDelay {
    fn default() -> Self {
        Self::new(DEFAULT_PROCESSING_DELAY)
    }
}

#[async_trait]
impl ProcessingWork for SimulatedDelay {
    async fn perform(&self, order: &Order) {
        tracing::debug!(order_id = ?order.id, delay_ms = self.delay.as_millis() as u64, "Simulating processing");
        tokio::time::sleep(self.delay).await;
    }
}

/// Completes immediately.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDelay;

#[async_trait]
impl ProcessingWork for NoDelay {
    async fn perform(&self, _order: &Order) {}
}
