use std::net::SocketAddr;
use std::time::Duration;

use axum::extract::Path;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use loyalty_accrual::HttpAccrualGateway;
use loyalty_core::{AccrualError, AccrualGateway, OrderStatus};
use rust_decimal_macros::dec;
use serde_json::json;

async fn accrual_order(Path(number): Path<String>) -> Response {
    match number.as_str() {
        "79927398713" => Json(json!({ "order": number, "status": "PROCESSED", "accrual": 500 })).into_response(),
        "12345678903" => (
            StatusCode::TOO_MANY_REQUESTS,
            [(header::RETRY_AFTER, "2")],
            "No more than 10 requests per minute allowed",
        )
            .into_response(),
        "2377225624" => {
            Json(json!({ "order": number, "status": "PROCESSED", "accrual": 5, "comment": "extra" })).into_response()
        }
        "4561261212345467" => StatusCode::NO_CONTENT.into_response(),
        "49927398716" => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        "0" => Json(json!({ "order": number, "status": "INVALID" })).into_response(),
        _ => Json(json!({ "order": number, "status": "REGISTERED" })).into_response(),
    }
}

async fn spawn_accrual_service() -> SocketAddr {
    let app = Router::new().route("/api/orders/{number}", get(accrual_order));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

async fn gateway() -> HttpAccrualGateway {
    let addr = spawn_accrual_service().await;
    // Trailing slash is tolerated.
    HttpAccrualGateway::new(&format!("http://{}/", addr), Duration::from_secs(2)).unwrap()
}

#[tokio::test]
async fn test_processed_response_is_decoded() {
    let result = gateway().await.request("79927398713").await.unwrap();
    assert_eq!(result.number, "79927398713");
    assert_eq!(result.status, OrderStatus::Processed);
    assert_eq!(result.accrual, dec!(500));
}

#[tokio::test]
async fn test_registered_and_invalid_statuses() {
    let gateway = gateway().await;

    let registered = gateway.request("1234567812345670").await.unwrap();
    assert_eq!(registered.status, OrderStatus::Processing);

    let invalid = gateway.request("0").await.unwrap();
    assert_eq!(invalid.status, OrderStatus::Invalid);
}

#[tokio::test]
async fn test_too_many_requests_carries_retry_after() {
    let err = gateway().await.request("12345678903").await.unwrap_err();
    assert_eq!(
        err,
        AccrualError::RateLimited {
            retry_after: Duration::from_secs(2)
        }
    );
    assert_eq!(err.pause(), Some(Duration::from_secs(2)));
}

#[tokio::test]
async fn test_unknown_fields_are_malformed() {
    let err = gateway().await.request("2377225624").await.unwrap_err();
    assert!(matches!(err, AccrualError::Malformed(_)));
}

#[tokio::test]
async fn test_no_content_and_server_errors() {
    let gateway = gateway().await;

    assert_eq!(gateway.request("4561261212345467").await.unwrap_err(), AccrualError::NotRegistered);
    assert!(matches!(
        gateway.request("49927398716").await.unwrap_err(),
        AccrualError::Transient(_)
    ));
}

#[tokio::test]
async fn test_unreachable_service_is_transient() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let gateway = HttpAccrualGateway::new(&format!("http://{}", addr), Duration::from_secs(1)).unwrap();
    let err = gateway.request("79927398713").await.unwrap_err();
    assert!(matches!(err, AccrualError::Transient(_)));
    assert_eq!(err.pause(), None);
}
