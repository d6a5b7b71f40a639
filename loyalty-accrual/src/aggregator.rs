use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use loyalty_core::{OrderResult, OrderStore};
use tokio::sync::Mutex;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tracing::{debug, error, info};

/// Results waiting for the next flush. The only state shared across workers.
#[derive(Clone, Default)]
pub struct PendingBatch {
    items: Arc<Mutex<Vec<OrderResult>>>,
}

impl PendingBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn push(&self, result: OrderResult) {
        self.items.lock().await.push(result);
    }

    pub async fn len(&self) -> usize {
        self.items.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.items.lock().await.is_empty()
    }

    /// Swap the batch for an empty one. Collapsing happens after the lock is released.
    pub async fn take(&self) -> Vec<OrderResult> {
        let drained = std::mem::take(&mut *self.items.lock().await);
        collapse(drained)
    }

    /// Put a batch that failed to flush back in front of newer results.
    pub async fn restore(&self, failed: Vec<OrderResult>) {
        let mut items = self.items.lock().await;
        let newer = std::mem::replace(&mut *items, failed);
        items.extend(newer);
    }
}

/// Keep only the latest result per order, in the order those results arrived.
fn collapse(items: Vec<OrderResult>) -> Vec<OrderResult> {
    let mut latest: HashMap<String, usize> = HashMap::with_capacity(items.len());
    for (idx, item) in items.iter().enumerate() {
        latest.insert(item.number.clone(), idx);
    }
    if latest.len() == items.len() {
        return items;
    }
    items
        .into_iter()
        .enumerate()
        .filter(|(idx, item)| latest.get(&item.number) == Some(idx))
        .map(|(_, item)| item)
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushOutcome {
    Empty,
    Flushed(usize),
    /// The write failed; the results went back into the batch.
    Retained(usize),
}

/// Periodically writes the pending batch to the store
#[derive(Clone)]
pub struct ResultAggregator {
    store: Arc<dyn OrderStore>,
    batch: PendingBatch,
    interval: Duration,
    store_timeout: Duration,
}

impl ResultAggregator {
    pub fn new(
        store: Arc<dyn OrderStore>,
        batch: PendingBatch,
        interval: Duration,
        store_timeout: Duration,
    ) -> Self {
        Self {
            store,
            batch,
            interval,
            store_timeout,
        }
    }

    pub fn batch(&self) -> &PendingBatch {
        &self.batch
    }

    pub async fn run(self, mut shutdown: crate::shutdown::Shutdown) {
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // First tick fires immediately and the batch is empty then.
        ticker.tick().await;
        info!("Accrual aggregator started, flushing every {:?}", self.interval);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.triggered() => break,
                _ = ticker.tick() => {}
            }
            self.flush().await;
        }

        info!("Accrual aggregator stopped");
    }

    pub async fn flush(&self) -> FlushOutcome {
        let batch = self.batch.take().await;
        if batch.is_empty() {
            return FlushOutcome::Empty;
        }
        let size = batch.len();

        let failure = match timeout(self.store_timeout, self.store.update_orders(&batch)).await {
            Ok(Ok(())) => {
                debug!("Flushed {} accrual results", size);
                return FlushOutcome::Flushed(size);
            }
            Ok(Err(e)) => e.to_string(),
            Err(_) => format!("timed out after {:?}", self.store_timeout),
        };

        // Replaying a batch that did land is harmless, so a timeout is retried too.
        error!(
            "Failed to flush {} accrual results, keeping them for the next flush: {}",
            size, failure
        );
        self.batch.restore(batch).await;
        FlushOutcome::Retained(size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loyalty_core::OrderStatus;
    use rust_decimal::Decimal;

    fn result(number: &str, status: OrderStatus, accrual: i64) -> OrderResult {
        OrderResult {
            number: number.to_string(),
            status,
            accrual: Decimal::from(accrual),
        }
    }

    #[tokio::test]
    async fn test_take_empties_batch() {
        let batch = PendingBatch::new();
        batch.push(result("1", OrderStatus::Processed, 5)).await;
        batch.push(result("2", OrderStatus::Invalid, 0)).await;

        let taken = batch.take().await;
        assert_eq!(taken.len(), 2);
        assert!(batch.is_empty().await);
    }

    #[tokio::test]
    async fn test_take_keeps_latest_result_per_order() {
        let batch = PendingBatch::new();
        batch.push(result("1", OrderStatus::Processing, 0)).await;
        batch.push(result("2", OrderStatus::Processed, 7)).await;
        batch.push(result("1", OrderStatus::Processed, 500)).await;

        let taken = batch.take().await;
        assert_eq!(
            taken,
            vec![result("2", OrderStatus::Processed, 7), result("1", OrderStatus::Processed, 500)]
        );
    }

    #[tokio::test]
    async fn test_restore_puts_failed_batch_before_newer_results() {
        let batch = PendingBatch::new();
        batch.push(result("1", OrderStatus::Processing, 0)).await;
        let failed = batch.take().await;

        batch.push(result("1", OrderStatus::Processed, 500)).await;
        batch.restore(failed).await;
        assert_eq!(batch.len().await, 2);

        // The newer outcome wins once collapsed.
        let taken = batch.take().await;
        assert_eq!(taken, vec![result("1", OrderStatus::Processed, 500)]);
    }
}
