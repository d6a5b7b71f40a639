use std::sync::Arc;

use loyalty_core::WorkItem;
use tokio::sync::{mpsc, Mutex};

pub type WorkSender = mpsc::Sender<WorkItem>;

/// Shared consumer end of the work queue; every worker holds a clone.
#[derive(Clone)]
pub struct WorkReceiver {
    inner: Arc<Mutex<mpsc::Receiver<WorkItem>>>,
}

impl WorkReceiver {
    /// Next item in FIFO order, or `None` once every sender is dropped.
    pub async fn recv(&self) -> Option<WorkItem> {
        self.inner.lock().await.recv().await
    }
}

/// Bounded FIFO queue; senders wait while it is full.
pub fn work_queue(capacity: usize) -> (WorkSender, WorkReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (
        tx,
        WorkReceiver {
            inner: Arc::new(Mutex::new(rx)),
        },
    )
}
