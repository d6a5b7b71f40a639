use axum::{
    extract::{rejection::JsonRejection, State},
    http::header,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::{error::AppError, middleware::issue_token, password, state::AppState};

#[derive(Debug, Deserialize)]
pub struct Credentials {
    pub login: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
struct AuthResponse {
    token: String,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/user/register", post(register))
        .route("/api/user/login", post(login))
}

fn credentials(payload: Result<Json<Credentials>, JsonRejection>) -> Result<Credentials, AppError> {
    let Json(creds) = payload.map_err(|e| AppError::ValidationError(e.body_text()))?;
    if creds.login.trim().is_empty() || creds.password.is_empty() {
        return Err(AppError::ValidationError("login and password are required".to_string()));
    }
    Ok(creds)
}

fn authorized(state: &AppState, login: &str) -> Result<Response, AppError> {
    let token = issue_token(&state.auth, login)?;
    Ok((
        [(header::AUTHORIZATION, format!("Bearer {}", token))],
        Json(AuthResponse { token }),
    )
        .into_response())
}

async fn register(
    State(state): State<AppState>,
    payload: Result<Json<Credentials>, JsonRejection>,
) -> Result<Response, AppError> {
    let creds = credentials(payload)?;

    state
        .users
        .create_user(&creds.login, &password::hash_password(&creds.password))
        .await?;
    tracing::info!("Registered user {}", creds.login);

    authorized(&state, &creds.login)
}

async fn login(
    State(state): State<AppState>,
    payload: Result<Json<Credentials>, JsonRejection>,
) -> Result<Response, AppError> {
    let creds = credentials(payload)?;

    let stored = state.users.password_hash(&creds.login).await?;
    match stored {
        Some(hash) if password::verify_password(&creds.password, &hash) => authorized(&state, &creds.login),
        _ => Err(AppError::AuthenticationError("invalid login or password".to_string())),
    }
}
