use axum::{
    http::Method,
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod auth;
pub mod balance;
pub mod error;
pub mod middleware;
pub mod orders;
pub mod password;
pub mod state;

pub use state::{AppState, AuthConfig};

pub fn app(state: AppState) -> Router {
    // CORS Middleware
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
            axum::http::header::USER_AGENT,
        ])
        .expose_headers([axum::http::header::AUTHORIZATION]);

    let protected = Router::new()
        .route("/api/user/orders", post(orders::submit_order).get(orders::list_orders))
        .route("/api/user/balance", get(balance::get_balance))
        .route("/api/user/balance/withdraw", post(balance::withdraw))
        .route("/api/user/withdrawals", get(balance::list_withdrawals))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth_middleware,
        ));

    Router::new()
        .merge(auth::routes())
        .merge(protected)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
