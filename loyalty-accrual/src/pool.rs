use std::sync::Arc;
use std::time::Duration;

use loyalty_core::{AccrualError, AccrualGateway, WorkItem};
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use crate::aggregator::PendingBatch;
use crate::queue::WorkReceiver;
use crate::shutdown::Shutdown;

/// Fixed-size set of workers draining the work queue
pub struct WorkerPool {
    gateway: Arc<dyn AccrualGateway>,
    queue: WorkReceiver,
    batch: PendingBatch,
    size: usize,
    request_timeout: Duration,
}

impl WorkerPool {
    pub fn new(
        gateway: Arc<dyn AccrualGateway>,
        queue: WorkReceiver,
        batch: PendingBatch,
        size: usize,
        request_timeout: Duration,
    ) -> Self {
        Self {
            gateway,
            queue,
            batch,
            size: size.max(1),
            request_timeout,
        }
    }

    /// Spawn every worker. The queue receiver is dropped once the last one exits.
    pub fn spawn(self, shutdown: Shutdown) -> Vec<JoinHandle<()>> {
        info!("Starting {} accrual workers", self.size);
        (0..self.size)
            .map(|id| {
                let worker = Worker {
                    id,
                    gateway: Arc::clone(&self.gateway),
                    queue: self.queue.clone(),
                    batch: self.batch.clone(),
                    request_timeout: self.request_timeout,
                };
                tokio::spawn(worker.run(shutdown.clone()))
            })
            .collect()
    }
}

pub struct Worker {
    id: usize,
    gateway: Arc<dyn AccrualGateway>,
    queue: WorkReceiver,
    batch: PendingBatch,
    request_timeout: Duration,
}

impl Worker {
    pub fn new(
        id: usize,
        gateway: Arc<dyn AccrualGateway>,
        queue: WorkReceiver,
        batch: PendingBatch,
        request_timeout: Duration,
    ) -> Self {
        Self {
            id,
            gateway,
            queue,
            batch,
            request_timeout,
        }
    }

    pub async fn run(self, mut shutdown: Shutdown) {
        loop {
            let item = tokio::select! {
                biased;
                _ = shutdown.triggered() => break,
                item = self.queue.recv() => match item {
                    Some(item) => item,
                    None => break,
                },
            };

            if let Some(pause) = self.process(item).await {
                // Only this worker waits; the rest keep draining the queue.
                tokio::select! {
                    biased;
                    _ = shutdown.triggered() => break,
                    _ = sleep(pause) => {}
                }
            }
        }

        debug!(worker = self.id, "Accrual worker stopped");
    }

    /// Look up one order. Returns the pause demanded by the upstream, if any.
    pub async fn process(&self, item: WorkItem) -> Option<Duration> {
        let request = self.gateway.request(&item.number);
        let outcome = match timeout(self.request_timeout, request).await {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!(
                    worker = self.id,
                    order = %item.number,
                    "Accrual request timed out after {:?}",
                    self.request_timeout
                );
                return None;
            }
        };

        let err = match outcome {
            Ok(result) if result.number != item.number => {
                warn!(
                    worker = self.id,
                    order = %item.number,
                    "Accrual service answered for order {}, dropping",
                    result.number
                );
                return None;
            }
            Ok(result) => {
                debug!(
                    worker = self.id,
                    order = %item.number,
                    status = %result.status,
                    "Accrual resolved"
                );
                self.batch.push(result).await;
                return None;
            }
            Err(err) => err,
        };

        if let Some(pause) = err.pause() {
            info!(
                worker = self.id,
                order = %item.number,
                "Accrual service rate limited, pausing {:?}",
                pause
            );
            return Some(pause);
        }

        match err {
            AccrualError::NotRegistered => {
                debug!(
                    worker = self.id,
                    order = %item.number,
                    "Order not registered in accrual service yet"
                );
            }
            e => warn!(worker = self.id, order = %item.number, "Accrual request failed: {}", e),
        }
        None
    }
}
