use std::time::Duration;

use async_trait::async_trait;
use loyalty_core::{AccrualError, AccrualGateway, OrderResult, OrderStatus};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, RETRY_AFTER};
use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use serde::Deserialize;

/// Pause used when a 429 carries no usable `Retry-After`.
pub const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(60);

/// Statuses reported by the accrual service
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
enum UpstreamStatus {
    Registered,
    Processing,
    Invalid,
    Processed,
}

impl From<UpstreamStatus> for OrderStatus {
    fn from(status: UpstreamStatus) -> Self {
        match status {
            // Registered upstream but not calculated yet.
            UpstreamStatus::Registered | UpstreamStatus::Processing => OrderStatus::Processing,
            UpstreamStatus::Invalid => OrderStatus::Invalid,
            UpstreamStatus::Processed => OrderStatus::Processed,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct AccrualResponse {
    order: String,
    status: UpstreamStatus,
    #[serde(default)]
    accrual: Option<Decimal>,
}

/// `GET {base}/api/orders/{number}` against the accrual service
pub struct HttpAccrualGateway {
    client: Client,
    base_url: String,
}

impl HttpAccrualGateway {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .user_agent("loyalty-accrual")
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn order_url(&self, number: &str) -> String {
        format!("{}/api/orders/{}", self.base_url, number)
    }
}

fn retry_after(headers: &HeaderMap) -> Duration {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_RETRY_AFTER)
}

fn decode(body: &[u8]) -> Result<OrderResult, AccrualError> {
    let response: AccrualResponse =
        serde_json::from_slice(body).map_err(|e| AccrualError::Malformed(e.to_string()))?;

    Ok(OrderResult {
        number: response.order,
        status: response.status.into(),
        accrual: response.accrual.unwrap_or(Decimal::ZERO),
    })
}

#[async_trait]
impl AccrualGateway for HttpAccrualGateway {
    async fn request(&self, order_number: &str) -> Result<OrderResult, AccrualError> {
        let response = self
            .client
            .get(self.order_url(order_number))
            .send()
            .await
            .map_err(|e| AccrualError::Transient(e.to_string()))?;

        match response.status() {
            StatusCode::OK => {
                let body = response
                    .bytes()
                    .await
                    .map_err(|e| AccrualError::Transient(e.to_string()))?;
                decode(&body)
            }
            StatusCode::NO_CONTENT => Err(AccrualError::NotRegistered),
            StatusCode::TOO_MANY_REQUESTS => Err(AccrualError::RateLimited {
                retry_after: retry_after(response.headers()),
            }),
            status => Err(AccrualError::Transient(format!("accrual service returned {}", status))),
        }
    }
}
