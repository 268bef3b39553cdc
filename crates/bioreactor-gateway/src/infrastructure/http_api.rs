//! HTTP API: operator commands, telemetry ingestion, and health.
//!
//! | Route               | Body                        | Success                                   |
//! |---------------------|-----------------------------|-------------------------------------------|
//! | `POST /mix`         | `{speed}`                   | `{message}`                               |
//! | `POST /drain`       | `{rate, duration}`          | `{message}`                               |
//! | `POST /fermentation`| fermentation profile        | `{message}`                               |
//! | `POST /stop`        | none                        | `{message}`                               |
//! | `POST /sensor_data` | `{sensor_value, timestamp}` | `{status, message, record}`               |
//! | `GET /sensor_data`  | none                        | array of stored rows                      |
//! | `GET /health`       | none                        | `{status, device_connected, frontend_connected}` |
//!
//! Command endpoints answer 200 with `"Device not connected"` when no device
//! is attached; that is a reported state, not an error.  Every failure is an
//! [`ApiError`] rendered as an [`ErrorBody`].

use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::Context;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use bioreactor_core::{
    Command, DrainParams, FermentationParams, MixParams, SnapshotError, StoredRow,
    ValidationError,
};
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::application::{
    CommandDispatcher, ConnectionRegistry, DispatchError, IngestError, PeerGone, StoreError,
    TelemetryIngestor,
};
use crate::domain::messages::{
    ErrorBody, HealthResponse, IngestRequest, IngestResponse, MessageResponse,
};

/// How often the graceful-shutdown watcher re-checks the shutdown flag.
const SHUTDOWN_POLL: Duration = Duration::from_millis(200);

/// Services shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<CommandDispatcher>,
    pub ingestor: Arc<TelemetryIngestor>,
    pub registry: Arc<ConnectionRegistry>,
}

// ── Errors ────────────────────────────────────────────────────────────────────

/// Every way an HTTP request can fail.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The body was not valid JSON of the expected shape.
    #[error("malformed request body: {0}")]
    Body(#[from] JsonRejection),

    /// A command parameter broke a domain rule.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A telemetry report failed schema validation.
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    /// The record store failed.
    #[error(transparent)]
    Storage(#[from] StoreError),

    /// The device connection closed while a command was being sent.
    #[error(transparent)]
    Transport(#[from] PeerGone),

    /// The device is connected but not draining its command queue.
    #[error("device is busy: its command queue is full")]
    DeviceBusy,

    /// A command could not be serialized.
    #[error("failed to encode command: {0}")]
    Encode(#[from] serde_json::Error),
}

impl ApiError {
    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Body(_) | ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Snapshot(SnapshotError::MissingField(_)) => StatusCode::BAD_REQUEST,
            ApiError::Snapshot(SnapshotError::InvalidField { .. }) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            ApiError::Storage(_) | ApiError::Encode(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Transport(_) => StatusCode::BAD_GATEWAY,
            ApiError::DeviceBusy => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Body(_) | ApiError::Validation(_) => "VALIDATION_ERROR",
            ApiError::Snapshot(SnapshotError::MissingField(_)) => "MISSING_FIELD",
            ApiError::Snapshot(SnapshotError::InvalidField { .. }) => "INVALID_FIELD",
            ApiError::Storage(_) => "STORAGE_ERROR",
            ApiError::Transport(_) => "TRANSPORT_ERROR",
            ApiError::DeviceBusy => "DEVICE_BUSY",
            ApiError::Encode(_) => "INTERNAL_ERROR",
        }
    }

    fn field(&self) -> Option<&'static str> {
        match self {
            ApiError::Validation(e) => Some(e.field),
            ApiError::Snapshot(e) => Some(e.field()),
            _ => None,
        }
    }
}

impl From<DispatchError> for ApiError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::Validation(e) => ApiError::Validation(e),
            DispatchError::Encode(e) => ApiError::Encode(e),
            DispatchError::Transport(e) => ApiError::Transport(e),
            DispatchError::Backlogged => ApiError::DeviceBusy,
        }
    }
}

impl From<IngestError> for ApiError {
    fn from(err: IngestError) -> Self {
        match err {
            IngestError::Snapshot(e) => ApiError::Snapshot(e),
            IngestError::Storage(e) => ApiError::Storage(e),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("request failed: {self}");
        } else {
            warn!("request rejected: {self}");
        }
        let body = ErrorBody {
            error: self.code().to_string(),
            message: self.to_string(),
            field: self.field().map(str::to_string),
        };
        (status, Json(body)).into_response()
    }
}

// ── Router ────────────────────────────────────────────────────────────────────

/// Builds the API router over `state`.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/mix", post(mix))
        .route("/drain", post(drain))
        .route("/fermentation", post(fermentation))
        .route("/stop", post(stop))
        .route("/sensor_data", post(ingest_sensor_data).get(read_sensor_data))
        .route("/health", get(health))
        .with_state(state)
}

async fn mix(
    State(state): State<AppState>,
    body: Result<Json<MixParams>, JsonRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let Json(params) = body?;
    send_command(&state, Command::try_from(params)?).await
}

async fn drain(
    State(state): State<AppState>,
    body: Result<Json<DrainParams>, JsonRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let Json(params) = body?;
    send_command(&state, Command::try_from(params)?).await
}

async fn fermentation(
    State(state): State<AppState>,
    body: Result<Json<FermentationParams>, JsonRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let Json(params) = body?;
    send_command(&state, Command::try_from(params)?).await
}

async fn stop(State(state): State<AppState>) -> Result<Json<MessageResponse>, ApiError> {
    send_command(&state, Command::Stop).await
}

async fn send_command(
    state: &AppState,
    command: Command,
) -> Result<Json<MessageResponse>, ApiError> {
    let outcome = state.dispatcher.dispatch(&command).await?;
    Ok(Json(MessageResponse::new(outcome.message())))
}

async fn ingest_sensor_data(
    State(state): State<AppState>,
    body: Result<Json<IngestRequest>, JsonRejection>,
) -> Result<Json<IngestResponse>, ApiError> {
    let Json(request) = body?;
    let record = state
        .ingestor
        .ingest(&request.timestamp, &request.sensor_value)
        .await?;
    Ok(Json(IngestResponse::stored(record)))
}

async fn read_sensor_data(
    State(state): State<AppState>,
) -> Result<Json<Vec<StoredRow>>, ApiError> {
    Ok(Json(state.ingestor.read_back().await?))
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let status = state.registry.status();
    Json(HealthResponse {
        status: "ok".to_string(),
        device_connected: status.device_connected,
        frontend_connected: status.frontend_connected,
    })
}

// ── Server ────────────────────────────────────────────────────────────────────

/// Binds `bind_addr` and serves the API until `running` is set to `false`.
///
/// # Errors
///
/// Returns an error if the listener cannot be bound or the server fails.
pub async fn run_http_server(
    bind_addr: SocketAddr,
    state: AppState,
    running: Arc<AtomicBool>,
) -> anyhow::Result<()> {
    let listener = TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("failed to bind HTTP listener on {bind_addr}"))?;

    info!("HTTP API listening on {bind_addr}");
    serve_http(listener, state, running).await
}

/// Serves the API on an already bound listener, shutting down gracefully
/// once `running` is cleared.
///
/// # Errors
///
/// Returns an error if the server fails.
pub async fn serve_http(
    listener: TcpListener,
    state: AppState,
    running: Arc<AtomicBool>,
) -> anyhow::Result<()> {
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move {
            while running.load(Ordering::Relaxed) {
                tokio::time::sleep(SHUTDOWN_POLL).await;
            }
            info!("shutdown flag set; stopping HTTP API");
        })
        .await
        .context("HTTP server failed")
}

// ── Tests ─────────────────────────────────────────────────────────────────────
