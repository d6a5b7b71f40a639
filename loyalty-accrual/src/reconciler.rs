use std::sync::Arc;

use loyalty_core::{AccrualGateway, OrderStore};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::aggregator::{FlushOutcome, PendingBatch, ResultAggregator};
use crate::config::ReconcilerConfig;
use crate::dispatcher::Dispatcher;
use crate::pool::WorkerPool;
use crate::queue::work_queue;
use crate::shutdown::{shutdown_channel, ShutdownTrigger};

/// Wires dispatcher, worker pool and aggregator around one queue and one batch
pub struct Reconciler {
    store: Arc<dyn OrderStore>,
    gateway: Arc<dyn AccrualGateway>,
    config: ReconcilerConfig,
}

impl Reconciler {
    pub fn new(
        store: Arc<dyn OrderStore>,
        gateway: Arc<dyn AccrualGateway>,
        config: ReconcilerConfig,
    ) -> Self {
        Self { store, gateway, config }
    }

    pub fn spawn(self) -> ReconcilerHandle {
        let (trigger, shutdown) = shutdown_channel();
        let (tx, rx) = work_queue(self.config.queue_capacity);
        let batch = PendingBatch::new();

        let dispatcher = Dispatcher::new(
            Arc::clone(&self.store),
            tx,
            self.config.dispatch_interval,
            self.config.store_timeout,
        );
        let pool = WorkerPool::new(
            self.gateway,
            rx,
            batch.clone(),
            self.config.workers,
            self.config.request_timeout,
        );
        let aggregator = ResultAggregator::new(
            self.store,
            batch,
            self.config.flush_interval,
            self.config.store_timeout,
        );

        let workers = pool.spawn(shutdown.clone());
        let dispatcher = tokio::spawn(dispatcher.run(shutdown.clone()));
        let aggregator_task = tokio::spawn(aggregator.clone().run(shutdown));

        ReconcilerHandle {
            trigger,
            dispatcher,
            workers,
            aggregator_task,
            aggregator,
        }
    }
}

/// Running pipeline. Dropping it stops the loops but skips the final flush.
pub struct ReconcilerHandle {
    trigger: ShutdownTrigger,
    dispatcher: JoinHandle<()>,
    workers: Vec<JoinHandle<()>>,
    aggregator_task: JoinHandle<()>,
    aggregator: ResultAggregator,
}

impl ReconcilerHandle {
    pub fn request_shutdown(&self) {
        self.trigger.trigger();
    }

    /// Results collected but not yet written.
    pub async fn pending_results(&self) -> usize {
        self.aggregator.batch().len().await
    }

    /// Stop every loop, then write whatever the workers produced before they exited.
    pub async fn shutdown_and_join(self) -> FlushOutcome {
        self.request_shutdown();

        if let Err(e) = self.dispatcher.await {
            warn!("Dispatcher task failed: {}", e);
        }
        for worker in self.workers {
            if let Err(e) = worker.await {
                warn!("Worker task failed: {}", e);
            }
        }
        if let Err(e) = self.aggregator_task.await {
            warn!("Aggregator task failed: {}", e);
        }

        let outcome = self.aggregator.flush().await;
        info!("Accrual reconciler stopped, final flush: {:?}", outcome);
        outcome
    }
}
