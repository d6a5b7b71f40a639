use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use loyalty_core::{luhn, Balance};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{error::AppError, middleware::Claims, state::AppState};

#[derive(Debug, Deserialize)]
pub struct WithdrawRequest {
    pub order: String,
    pub sum: Decimal,
}

#[derive(Debug, Serialize)]
pub struct WithdrawalResponse {
    pub order: String,
    pub sum: Decimal,
    pub processed_at: DateTime<Utc>,
}

/// GET /api/user/balance
pub async fn get_balance(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Balance>, AppError> {
    Ok(Json(state.ledger.balance(&claims.sub).await?))
}

/// POST /api/user/balance/withdraw
pub async fn withdraw(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    payload: Result<Json<WithdrawRequest>, JsonRejection>,
) -> Result<StatusCode, AppError> {
    let Json(req) = payload.map_err(|e| AppError::ValidationError(e.body_text()))?;

    // Any malformed number is unprocessable here, not just a bad checksum.
    let order = luhn::parse_order_number(&req.order).map_err(|e| AppError::UnprocessableEntity(e.to_string()))?;
    if req.sum <= Decimal::ZERO {
        return Err(AppError::UnprocessableEntity("sum must be positive".to_string()));
    }

    state.ledger.withdraw(&claims.sub, &order, req.sum).await?;
    tracing::info!("User {} withdrew {} against order {}", claims.sub, req.sum, order);
    Ok(StatusCode::OK)
}

/// GET /api/user/withdrawals
pub async fn list_withdrawals(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Response, AppError> {
    let withdrawals = state.ledger.list_withdrawals(&claims.sub).await?;
    if withdrawals.is_empty() {
        return Ok(StatusCode::NO_CONTENT.into_response());
    }

    let body: Vec<WithdrawalResponse> = withdrawals
        .into_iter()
        .map(|w| WithdrawalResponse {
            order: w.order,
            sum: w.sum,
            processed_at: w.processed_at,
        })
        .collect();
    Ok(Json(body).into_response())
}
