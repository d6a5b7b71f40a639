use std::sync::Arc;
use std::time::Duration;

use loyalty_core::{OrderStore, WorkItem};
use tokio::time::{interval, timeout, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::queue::WorkSender;
use crate::shutdown::Shutdown;

/// Result of a single dispatch tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Dispatched(usize),
    /// Store query failed or timed out; retried next tick.
    Skipped,
    /// Shutdown observed while sending; carries the items already sent.
    Interrupted(usize),
    QueueClosed,
}

/// Polls the store for pending orders and feeds the work queue
pub struct Dispatcher {
    store: Arc<dyn OrderStore>,
    queue: WorkSender,
    interval: Duration,
    store_timeout: Duration,
}

impl Dispatcher {
    pub fn new(
        store: Arc<dyn OrderStore>,
        queue: WorkSender,
        interval: Duration,
        store_timeout: Duration,
    ) -> Self {
        Self {
            store,
            queue,
            interval,
            store_timeout,
        }
    }

    pub async fn run(self, mut shutdown: Shutdown) {
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!("Accrual dispatcher started, polling every {:?}", self.interval);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.triggered() => break,
                _ = ticker.tick() => {}
            }

            match self.tick(&mut shutdown).await {
                TickOutcome::Dispatched(0) | TickOutcome::Skipped => {}
                TickOutcome::Dispatched(n) => debug!("Dispatched {} pending orders", n),
                TickOutcome::Interrupted(n) => {
                    debug!("Dispatch interrupted by shutdown after {} orders", n);
                    break;
                }
                TickOutcome::QueueClosed => {
                    warn!("Work queue closed, dispatcher exiting");
                    break;
                }
            }
        }

        info!("Accrual dispatcher stopped");
    }

    /// Fetch pending orders once and enqueue every one of them.
    ///
    /// A full queue blocks the send. Shutdown abandons the rest of the tick;
    /// abandoned orders stay pending in the store and are offered again later.
    pub async fn tick(&self, shutdown: &mut Shutdown) -> TickOutcome {
        let orders = match timeout(self.store_timeout, self.store.fetch_pending()).await {
            Ok(Ok(orders)) => orders,
            Ok(Err(e)) => {
                error!("Failed to fetch pending orders: {}", e);
                return TickOutcome::Skipped;
            }
            Err(_) => {
                error!("Fetching pending orders timed out after {:?}", self.store_timeout);
                return TickOutcome::Skipped;
            }
        };

        let mut sent = 0;
        for order in &orders {
            let item = WorkItem::from(order);
            tokio::select! {
                biased;
                _ = shutdown.triggered() => return TickOutcome::Interrupted(sent),
                res = self.queue.send(item) => {
                    if res.is_err() {
                        return TickOutcome::QueueClosed;
                    }
                }
            }
            sent += 1;
        }

        TickOutcome::Dispatched(sent)
    }
}
