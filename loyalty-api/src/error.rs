use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use loyalty_core::{CoreError, StoreError};
use serde_json::json;

#[derive(Debug)]
pub enum AppError {
    AuthenticationError(String),
    ValidationError(String),
    UnprocessableEntity(String),
    PaymentRequired(String),
    ConflictError(String),
    InternalServerError(String),
    Anyhow(anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::AuthenticationError(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::UnprocessableEntity(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg),
            AppError::PaymentRequired(msg) => (StatusCode::PAYMENT_REQUIRED, msg),
            AppError::ConflictError(msg) => (StatusCode::CONFLICT, msg),
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error".to_string())
            }
            AppError::Anyhow(err) => {
                tracing::error!("Internal Server Error: {:#}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error".to_string())
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::UserExists(login) => AppError::ConflictError(format!("login {login} is taken")),
            StoreError::Conflict(msg) => AppError::ConflictError(msg),
            StoreError::InsufficientFunds => AppError::PaymentRequired("insufficient funds".to_string()),
            StoreError::Backend(e) => AppError::InternalServerError(e.to_string()),
        }
    }
}

impl From<CoreError> for AppError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ValidationError(msg) => AppError::ValidationError(msg),
            CoreError::ChecksumError(msg) => AppError::UnprocessableEntity(msg),
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::Anyhow(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_errors_map_to_statuses() {
        let cases = [
            (StoreError::UserExists("alice".into()), StatusCode::CONFLICT),
            (StoreError::Conflict("used".into()), StatusCode::CONFLICT),
            (StoreError::InsufficientFunds, StatusCode::PAYMENT_REQUIRED),
            (StoreError::Backend("down".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(AppError::from(err).into_response().status(), status);
        }
    }

    #[test]
    fn test_checksum_failure_is_unprocessable() {
        let resp = AppError::from(CoreError::ChecksumError("123".into())).into_response();
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let resp = AppError::from(CoreError::ValidationError("abc".into())).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
