//! Lifecycle event processor.

use std::time::Instant;

use chrono::Utc;
use common::{EventKind, LifecycleEvent, Order};
use metrics::{counter, histogram};
use order_store::OrderStore;

use crate::error::{ProcessError, Result};
use crate::work::{ProcessingWork, SimulatedDelay};

/// What happened to an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// The order was moved through `PROCESSING` to `COMPLETED`.
    Completed(Order),
    /// The event kind isn't handled; the store was not touched.
    Skipped { event_type: EventKind },
}

/// Applies lifecycle events to orders.
///
/// `CREATE` and `UPDATE` events both run the two-phase transition: the order
/// is re-read from the store, saved as `PROCESSING`, the processing work
/// runs, and the order is saved again as `COMPLETED` with its processed
/// timestamp. The event's own fields are used only for addressing.
///
/// There is no deduplication. A redelivered event repeats both writes and
/// leaves the order `COMPLETED`.
pub struct OrderEventProcessor<S: OrderStore, W: ProcessingWork = SimulatedDelay> {
    store: S,
    work: W,
}

impl<S: OrderStore, W: ProcessingWork> OrderEventProcessor<S, W> {
    /// Creates a new processor over the given store and processing work.
    pub fn new(store: S, work: W) -> Self {
        Self { store, work }
    }

    /// Returns a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Applies a single event.
    #[tracing::instrument(skip(self, event), fields(order_id = ?event.order_id, event_type = %event.event_type))]
    pub async fn process(&self, event: &LifecycleEvent) -> Result<ProcessOutcome> {
        if let EventKind::Other(kind) = &event.event_type {
            tracing::warn!(event_type = %kind, "Unrecognized event type, skipping");
            counter!("order_events_unrecognized_total").increment(1);
            return Ok(ProcessOutcome::Skipped {
                event_type: event.event_type.clone(),
            });
        }

        let id = event.order_id.ok_or(ProcessError::MissingOrderId)?;
        let started = Instant::now();

        let Some(mut order) = self.store.find_by_id(id).await? else {
            tracing::warn!(order_id = %id, "Order not found, dropping event");
            counter!("order_events_not_found_total").increment(1);
            return Err(ProcessError::OrderNotFound(id));
        };

        if order.order_status.is_terminal() {
            tracing::info!(order_id = %id, status = %order.order_status, "Reprocessing order in terminal status");
            counter!("order_events_reprocessed_total").increment(1);
        }

        order.start_processing();
        let mut order = self.store.save(order).await?;
        tracing::debug!(order_id = %id, "Order marked PROCESSING");

        self.work.perform(&order).await;

        order.complete(Utc::now());
        let order = self.store.save(order).await?;

        tracing::info!(order_id = %id, processed_at = ?order.processed_at, "Order completed");
        counter!("order_events_processed_total", "event_type" => event.event_type.to_string())
            .increment(1);
        histogram!("order_processing_duration_seconds").record(started.elapsed().as_secs_f64());

        Ok(ProcessOutcome::Completed(order))
    }
}
