use std::time::Duration;
use anyhow::Context;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::Value;
use tower_http::trace::TraceLayer;
use shared::protocol::{
    COUNT_CONNECTED_PATH, COUNT_FAILED_PATH, CONNECTED_USER_PATH, HEALTH_PATH, LOGIN_PATH,
    LOG_PATH, MSG_ERROR, MSG_FAILED, MSG_SUCCESS, MSG_WRONG_PASSWORD, STATUS_CONNECTED,
    STATUS_FAILED,
};
use shared::types::{ApiResponse, LoginRequest, LoginResponse, NewLogEntry, PresenceUpdate};
use crate::service::{
    with_deadline, AuthError, CredentialStore, LogStore, PresenceStore, ServiceError,
};

#[derive(Clone)]
pub struct AppState {
    pub logs: LogStore,
    pub presence: PresenceStore,
    pub credentials: CredentialStore,
    pub request_timeout: Duration,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route(LOG_PATH, post(post_log).get(get_logs))
        .route(COUNT_CONNECTED_PATH, get(count_connected))
        .route(COUNT_FAILED_PATH, get(count_failed))
        .route(CONNECTED_USER_PATH, post(post_presence).get(get_presence))
        .route(LOGIN_PATH, post(post_login))
        .route(HEALTH_PATH, get(healthz))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = match &self {
            ServiceError::Validation(_) => StatusCode::BAD_REQUEST,
            ServiceError::Storage(e) => {
                tracing::error!("Storage failure: {:#}", e);
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ServiceError::Timeout => {
                tracing::warn!("Request exceeded its deadline");
                StatusCode::GATEWAY_TIMEOUT
            }
        };

        let body = ApiResponse::new(status.as_u16(), MSG_ERROR, "data", Value::String(self.to_string()));
        (status, Json(body)).into_response()
    }
}

impl From<JsonRejection> for ServiceError {
    fn from(rejection: JsonRejection) -> Self {
        ServiceError::Validation(rejection.body_text())
    }
}

/// Wrap `value` under `key` in a success envelope
fn envelope<T: Serialize>(status: StatusCode, key: &str, value: T) -> Result<Response, ServiceError> {
    let value = serde_json::to_value(value).context("Failed to serialize response")?;
    let body = ApiResponse::new(status.as_u16(), MSG_SUCCESS, key, value);
    Ok((status, Json(body)).into_response())
}

async fn post_log(
    State(state): State<AppState>,
    body: Result<Json<NewLogEntry>, JsonRejection>,
) -> Result<Response, ServiceError> {
    let Json(entry) = body?;
    let stored = with_deadline(state.request_timeout, state.logs.insert(entry)).await?;
    envelope(StatusCode::CREATED, "data", stored)
}

async fn get_logs(State(state): State<AppState>) -> Result<Response, ServiceError> {
    let logs = with_deadline(state.request_timeout, state.logs.list_all()).await?;
    envelope(StatusCode::OK, "array", logs)
}

async fn count_connected(State(state): State<AppState>) -> Result<Response, ServiceError> {
    count_status(&state, STATUS_CONNECTED).await
}

async fn count_failed(State(state): State<AppState>) -> Result<Response, ServiceError> {
    count_status(&state, STATUS_FAILED).await
}

async fn count_status(state: &AppState, status: &str) -> Result<Response, ServiceError> {
    let count = with_deadline(state.request_timeout, state.logs.count_by_status(status)).await?;
    envelope(StatusCode::OK, "count", count)
}

async fn post_presence(
    State(state): State<AppState>,
    body: Result<Json<PresenceUpdate>, JsonRejection>,
) -> Result<Response, ServiceError> {
    let Json(update) = body?;
    let outcome = with_deadline(state.request_timeout, state.presence.upsert(update)).await?;
    envelope(StatusCode::CREATED, "data", outcome)
}

async fn get_presence(State(state): State<AppState>) -> Result<Response, ServiceError> {
    let records = with_deadline(state.request_timeout, state.presence.list_all()).await?;
    envelope(StatusCode::OK, "array", records)
}

/// Unknown user and wrong password both answer 500, as existing clients expect.
async fn post_login(
    State(state): State<AppState>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Response {
    let request = match body {
        Ok(Json(request)) => request,
        Err(rejection) => return ServiceError::from(rejection).into_response(),
    };

    let mut missing = Vec::new();
    if request.username.trim().is_empty() {
        missing.push("username");
    }
    if request.password.is_empty() {
        missing.push("password");
    }
    if !missing.is_empty() {
        return ServiceError::Validation(format!("missing required fields: {}", missing.join(", ")))
            .into_response();
    }

    let result = with_deadline(
        state.request_timeout,
        state.credentials.login(&request.username, &request.password),
    )
    .await;

    let message = match result {
        Ok(()) => {
            tracing::info!(username = %request.username, "Login succeeded");
            return (StatusCode::OK, Json(LoginResponse { message: MSG_SUCCESS.to_string() }))
                .into_response();
        }
        Err(AuthError::NotFound) => {
            tracing::warn!(username = %request.username, "Login for unknown user");
            MSG_FAILED
        }
        Err(AuthError::WrongPassword) => {
            tracing::warn!(username = %request.username, "Login with wrong password");
            MSG_WRONG_PASSWORD
        }
        Err(AuthError::Service(e)) => {
            tracing::error!("Login failed: {}", e);
            MSG_FAILED
        }
    };

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(LoginResponse { message: message.to_string() }),
    )
        .into_response()
}

async fn healthz() -> &'static str {
    "ok"
}
