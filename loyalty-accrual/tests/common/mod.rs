#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use loyalty_accrual::ReconcilerConfig;
use loyalty_core::{
    AccrualError, AccrualGateway, Order, OrderResult, OrderStatus, OrderStore, StoreError, StoreResult,
};
use loyalty_store::MemoryStore;
use rust_decimal::Decimal;
use tokio::time::Instant;

/// Gateway double. Scripted responses are used in order and the last one repeats;
/// unscripted orders resolve to PROCESSED/100.
#[derive(Default)]
pub struct ScriptedGateway {
    scripts: Mutex<HashMap<String, VecDeque<Result<OrderResult, AccrualError>>>>,
    calls: Mutex<Vec<(String, Instant)>>,
    latency: Duration,
}

impl ScriptedGateway {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_latency(latency: Duration) -> Arc<Self> {
        Arc::new(Self {
            latency,
            ..Self::default()
        })
    }

    pub fn script(&self, number: &str, responses: Vec<Result<OrderResult, AccrualError>>) {
        self.scripts
            .lock()
            .unwrap()
            .insert(number.to_string(), responses.into_iter().collect());
    }

    pub fn calls_for(&self, number: &str) -> Vec<Instant> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(n, _)| n == number)
            .map(|(_, at)| *at)
            .collect()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl AccrualGateway for ScriptedGateway {
    async fn request(&self, order_number: &str) -> Result<OrderResult, AccrualError> {
        self.calls
            .lock()
            .unwrap()
            .push((order_number.to_string(), Instant::now()));

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let scripted = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(order_number)
            .and_then(|responses| {
                if responses.len() > 1 {
                    responses.pop_front()
                } else {
                    responses.front().cloned()
                }
            });

        scripted.unwrap_or_else(|| Ok(processed(order_number, Decimal::from(100))))
    }
}

/// Store whose reads always fail.
pub struct BrokenStore;

#[async_trait]
impl OrderStore for BrokenStore {
    async fn fetch_pending(&self) -> StoreResult<Vec<Order>> {
        Err(StoreError::Backend("connection reset".into()))
    }

    async fn update_orders(&self, _batch: &[OrderResult]) -> StoreResult<()> {
        Err(StoreError::Backend("connection reset".into()))
    }
}

/// Store whose calls never complete.
pub struct HangingStore;

#[async_trait]
impl OrderStore for HangingStore {
    async fn fetch_pending(&self) -> StoreResult<Vec<Order>> {
        std::future::pending().await
    }

    async fn update_orders(&self, _batch: &[OrderResult]) -> StoreResult<()> {
        std::future::pending().await
    }
}

pub fn processed(number: &str, accrual: Decimal) -> OrderResult {
    OrderResult {
        number: number.to_string(),
        status: OrderStatus::Processed,
        accrual,
    }
}

pub fn rate_limited(secs: u64) -> Result<OrderResult, AccrualError> {
    Err(AccrualError::RateLimited {
        retry_after: Duration::from_secs(secs),
    })
}

pub fn fast_config(workers: usize) -> ReconcilerConfig {
    ReconcilerConfig {
        dispatch_interval: Duration::from_millis(100),
        flush_interval: Duration::from_millis(250),
        workers,
        queue_capacity: 16,
        request_timeout: Duration::from_secs(1),
        store_timeout: Duration::from_secs(1),
    }
}

pub async fn seeded_store(numbers: &[&str]) -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    for number in numbers {
        store.insert_order(Order::new(number.to_string(), "alice".to_string())).await;
    }
    store
}
