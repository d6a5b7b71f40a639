//! Accrual reconciliation: finds orders whose reward is not final yet, asks the
//! accrual service about each one and writes the outcomes back in batches.
//!
//! The pipeline has three independently scheduled stages sharing one
//! shutdown signal:
//!
//! - [`Dispatcher`]: polls the store for pending orders and feeds a bounded queue
//! - [`WorkerPool`]: drains the queue, calls the [`AccrualGateway`], honors rate limits
//! - [`ResultAggregator`]: flushes collected results to the store on its own timer
//!
//! [`AccrualGateway`]: loyalty_core::AccrualGateway

pub mod aggregator;
pub mod client;
pub mod config;
pub mod dispatcher;
pub mod pool;
pub mod queue;
pub mod reconciler;
pub mod shutdown;

pub use aggregator::{FlushOutcome, PendingBatch, ResultAggregator};
pub use client::HttpAccrualGateway;
pub use config::ReconcilerConfig;
pub use dispatcher::{Dispatcher, TickOutcome};
pub use pool::{Worker, WorkerPool};
pub use queue::{work_queue, WorkReceiver, WorkSender};
pub use reconciler::{Reconciler, ReconcilerHandle};
pub use shutdown::{shutdown_channel, Shutdown, ShutdownTrigger};
