use std::time::Duration;

/// Timings and sizes of the reconciliation pipeline
#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    pub dispatch_interval: Duration,
    /// Coarser than `dispatch_interval` in practice.
    pub flush_interval: Duration,
    pub workers: usize,
    pub queue_capacity: usize,
    pub request_timeout: Duration,
    pub store_timeout: Duration,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            dispatch_interval: Duration::from_millis(500),
            flush_interval: Duration::from_secs(2),
            workers: 4,
            queue_capacity: 64,
            request_timeout: Duration::from_secs(3),
            store_timeout: Duration::from_secs(10),
        }
    }
}
