use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use loyalty_core::{luhn, Order, OrderStatus, SubmitOutcome};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::{error::AppError, middleware::Claims, state::AppState};

#[derive(Debug, Serialize)]
pub struct OrderResponse {
    pub number: String,
    pub status: OrderStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accrual: Option<Decimal>,
    pub uploaded_at: DateTime<Utc>,
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        Self {
            accrual: (order.status == OrderStatus::Processed).then_some(order.accrual),
            number: order.number,
            status: order.status,
            uploaded_at: order.uploaded_at,
        }
    }
}

/// POST /api/user/orders
pub async fn submit_order(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    body: String,
) -> Result<StatusCode, AppError> {
    let number = luhn::parse_order_number(&body)?;

    match state.ledger.submit_order(&number, &claims.sub).await? {
        SubmitOutcome::Accepted => {
            tracing::info!("Order {} uploaded by {}", number, claims.sub);
            Ok(StatusCode::ACCEPTED)
        }
        SubmitOutcome::AlreadyUploaded => Ok(StatusCode::OK),
        SubmitOutcome::OwnedByAnotherUser => Err(AppError::ConflictError(format!(
            "order {} was uploaded by another user",
            number
        ))),
    }
}

/// GET /api/user/orders
pub async fn list_orders(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Response, AppError> {
    let orders = state.ledger.list_orders(&claims.sub).await?;
    if orders.is_empty() {
        return Ok(StatusCode::NO_CONTENT.into_response());
    }

    let body: Vec<OrderResponse> = orders.into_iter().map(OrderResponse::from).collect();
    Ok(Json(body).into_response())
}
