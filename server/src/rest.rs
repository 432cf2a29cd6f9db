use crate::auth::{AuthGate, Role, TokenMeta};
use crate::config::{AppConfig, ConfigStore};
use crate::db::SensorStore;
use crate::errors::Error;
use crate::model::{Location, SensorReading, Severity, TelemetryRecord};
use crate::query::Statistics;
use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::error;

const MAX_LIMIT: i64 = 1000;
const DEFAULT_HISTORY_LIMIT: i64 = 100;
const DEFAULT_ALERTS_LIMIT: i64 = 50;

#[derive(Clone)]
pub struct AppState {
    pub store: SensorStore,
    pub config: Arc<ConfigStore>,
    pub auth: Arc<AuthGate>,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/auth/login", post(login))
        .route("/api/auth/logout", post(logout))
        .route("/api/devices/latest", get(get_latest_devices))
        .route("/api/devices/:device_id/history", get(get_device_history))
        .route("/api/records/get", get(get_records))
        .route("/api/records/delete", delete(delete_records))
        .route("/api/alerts", get(get_alerts))
        .route("/api/statistics", get(get_statistics))
        .route("/api/configs/get", get(get_config))
        .route("/api/configs/update", put(update_config))
        .route("/api/configs/reset", post(reset_config))
        .with_state(state)
}

/// Explicit authorization guard invoked at the top of each protected
/// handler: extracts the bearer token and checks it (and the required
/// role, if any) against the active set.
fn authorize(
    state: &AppState,
    headers: &HeaderMap,
    required_role: Option<Role>,
) -> Result<TokenMeta, AppError> {
    let token = bearer_token(headers).ok_or(Error::NotAuthorized)?;
    Ok(state.auth.validate(token, required_role)?)
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get("authorization")?.to_str().ok()?;
    Some(value.strip_prefix("Bearer ").unwrap_or(value))
}

/// Result-set cap: negative limits must not leak through to the storage
/// layer, where they carry special batch semantics.
fn clamp_limit(requested: Option<i64>, default: i64) -> i64 {
    requested.unwrap_or(default).clamp(0, MAX_LIMIT)
}

/// Record as rendered at the API boundary: hex id, ISO-8601 timestamp.
#[derive(Debug, Serialize)]
struct RecordView {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    #[serde(rename = "deviceId")]
    device_id: String,
    timestamp: DateTime<Utc>,
    data: SensorReading,
    severity: Severity,
    #[serde(skip_serializing_if = "Option::is_none")]
    location: Option<Location>,
}

impl From<TelemetryRecord> for RecordView {
    fn from(record: TelemetryRecord) -> Self {
        Self {
            id: record.id.map(|id| id.to_hex()),
            device_id: record.device_id,
            timestamp: record.timestamp,
            data: record.data,
            severity: record.severity,
            location: record.location,
        }
    }
}

fn views(records: Vec<TelemetryRecord>) -> Vec<RecordView> {
    records.into_iter().map(RecordView::from).collect()
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    let mongodb = match state.store.ping().await {
        Ok(()) => "connected",
        Err(e) => {
            error!("health check failed: {}", e);
            "disconnected"
        }
    };

    Json(json!({
        "status": if mongodb == "connected" { "ok" } else { "error" },
        "mongodb": mongodb,
        "ingestion": "running",
        "timestamp": Utc::now(),
    }))
}

#[derive(Debug, Deserialize)]
struct LoginRequest {
    username: String,
    password: String,
}

async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<Value>, AppError> {
    let (token, meta) = state.auth.login(&body.username, &body.password)?;

    Ok(Json(json!({
        "status": "success",
        "token": token,
        "role": meta.role,
        "expires_at": meta.expires_at,
        "message": "Login successful",
    })))
}

async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Value>, AppError> {
    authorize(&state, &headers, None)?;

    // authorize() succeeded, so the token is present.
    let token = bearer_token(&headers).ok_or(Error::NotAuthorized)?;
    state.auth.logout(token);

    Ok(Json(json!({
        "status": "success",
        "message": "Logout successful",
    })))
}

async fn get_latest_devices(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<RecordView>>, AppError> {
    authorize(&state, &headers, None)?;
    let records = state.store.latest_per_device().await?;
    Ok(Json(views(records)))
}

#[derive(Debug, Deserialize)]
struct HistoryQuery {
    from: Option<String>,
    to: Option<String>,
    limit: Option<i64>,
}

async fn get_device_history(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(device_id): Path<String>,
    Query(params): Query<HistoryQuery>,
) -> Result<Json<Vec<RecordView>>, AppError> {
    authorize(&state, &headers, None)?;

    let limit = clamp_limit(params.limit, DEFAULT_HISTORY_LIMIT);
    let records = state
        .store
        .history(&device_id, params.from.as_deref(), params.to.as_deref(), limit)
        .await?;
    Ok(Json(views(records)))
}

#[derive(Debug, Deserialize)]
struct RecordsQuery {
    device_id: Option<String>,
    from: Option<String>,
    to: Option<String>,
    limit: Option<i64>,
}

/// Combined legacy route: per-device history when `device_id` is given,
/// otherwise the latest-per-device view.
async fn get_records(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<RecordsQuery>,
) -> Result<Json<Vec<RecordView>>, AppError> {
    authorize(&state, &headers, None)?;

    let records = match params.device_id.as_deref() {
        Some(device_id) => {
            let limit = clamp_limit(params.limit, DEFAULT_HISTORY_LIMIT);
            state
                .store
                .history(device_id, params.from.as_deref(), params.to.as_deref(), limit)
                .await?
        }
        None => state.store.latest_per_device().await?,
    };
    Ok(Json(views(records)))
}

#[derive(Debug, Deserialize)]
struct AlertsQuery {
    limit: Option<i64>,
}

async fn get_alerts(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<AlertsQuery>,
) -> Result<Json<Vec<RecordView>>, AppError> {
    authorize(&state, &headers, None)?;

    let limit = clamp_limit(params.limit, DEFAULT_ALERTS_LIMIT);
    let records = state.store.alerts(limit).await?;
    Ok(Json(views(records)))
}

async fn get_statistics(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Statistics>, AppError> {
    authorize(&state, &headers, None)?;
    Ok(Json(state.store.statistics().await?))
}

#[derive(Debug, Default, Deserialize)]
struct DeleteRequest {
    device_id: Option<String>,
    from: Option<String>,
    to: Option<String>,
}

async fn delete_records(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Option<Json<DeleteRequest>>,
) -> Result<Json<Value>, AppError> {
    authorize(&state, &headers, Some(Role::Admin))?;

    let Json(filter) = body.unwrap_or_default();
    let deleted = state
        .store
        .delete_records(
            filter.device_id.as_deref(),
            filter.from.as_deref(),
            filter.to.as_deref(),
        )
        .await?;

    Ok(Json(json!({
        "status": "success",
        "deleted_count": deleted,
    })))
}

async fn get_config(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<AppConfig>, AppError> {
    authorize(&state, &headers, None)?;
    Ok(Json(state.config.snapshot()))
}

async fn update_config(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(updates): Json<Value>,
) -> Result<Json<Value>, AppError> {
    authorize(&state, &headers, Some(Role::Admin))?;

    let config = state.config.update(&updates)?;
    Ok(Json(json!({
        "status": "success",
        "message": "Configuration updated",
        "config": config,
    })))
}

async fn reset_config(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Value>, AppError> {
    authorize(&state, &headers, Some(Role::Admin))?;

    let config = state.config.reset();
    Ok(Json(json!({
        "status": "success",
        "message": "Configuration reset to defaults",
        "config": config,
    })))
}

/// Translates the error taxonomy into HTTP responses; every error is
/// logged with its cause before translation.
struct AppError(Error);

impl From<Error> for AppError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            Error::Decode(_) | Error::InvalidRange(_) | Error::ConfigValidation(_) => {
                StatusCode::BAD_REQUEST
            }
            Error::InvalidCredentials => StatusCode::UNAUTHORIZED,
            Error::NotAuthorized => StatusCode::FORBIDDEN,
            Error::Persistence(_) | Error::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!("API error: {}", self.0);
            (status, Json(json!({ "error": "Internal server error" }))).into_response()
        } else {
            (status, Json(json!({ "error": self.0.to_string() }))).into_response()
        }
    }
}
