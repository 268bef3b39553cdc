//! Integration tests for the HTTP API.
//!
//! The router is driven in-process with `tower::ServiceExt::oneshot`; the
//! record store is a real CSV file in a temp directory unless a test swaps in
//! a failing sink.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use bioreactor_core::{FieldKind, RecordRow, Role, StoredRow, SNAPSHOT_FIELDS};
use bioreactor_gateway::application::registry::OUTBOUND_CAPACITY;
use bioreactor_gateway::application::{
    CommandDispatcher, ConnectionRegistry, RecordSink, RelayEngine, StoreError, TelemetryIngestor,
};
use bioreactor_gateway::domain::{ErrorBody, HealthResponse, IngestResponse, MessageResponse};
use bioreactor_gateway::infrastructure::http_api::router;
use bioreactor_gateway::infrastructure::{AppState, CsvRecordStore};
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use tower::ServiceExt;
use uuid::Uuid;

// ── Fixtures ──────────────────────────────────────────────────────────────────

struct TestApp {
    router: Router,
    relay: Arc<RelayEngine>,
    data_dir: PathBuf,
}

impl Drop for TestApp {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.data_dir);
    }
}

fn app_with_sink(sink: Arc<dyn RecordSink>, data_dir: PathBuf) -> TestApp {
    let registry = Arc::new(ConnectionRegistry::new());
    let relay = Arc::new(RelayEngine::new(Arc::clone(&registry)));
    let state = AppState {
        dispatcher: Arc::new(CommandDispatcher::new(Arc::clone(&relay))),
        ingestor: Arc::new(TelemetryIngestor::new(sink)),
        registry,
    };
    TestApp {
        router: router(state),
        relay,
        data_dir,
    }
}

fn app() -> TestApp {
    let data_dir = std::env::temp_dir().join(format!("bioreactor-http-{}", Uuid::new_v4()));
    let store = Arc::new(CsvRecordStore::new(data_dir.join("data.csv")));
    app_with_sink(store, data_dir)
}

/// A sink whose every operation fails with an I/O error.
struct BrokenDisk;

#[async_trait]
impl RecordSink for BrokenDisk {
    async fn ensure_header(&self) -> Result<(), StoreError> {
        Err(broken())
    }

    async fn append(&self, _row: RecordRow) -> Result<u64, StoreError> {
        Err(broken())
    }

    async fn read_all(&self) -> Result<Vec<StoredRow>, StoreError> {
        Err(broken())
    }
}

fn broken() -> StoreError {
    StoreError::Io {
        path: PathBuf::from("/dev/full/data.csv"),
        source: std::io::Error::new(std::io::ErrorKind::Other, "no space left on device"),
    }
}

fn report(device_time: &str) -> Value {
    let fields: Map<String, Value> = SNAPSHOT_FIELDS
        .iter()
        .map(|spec| {
            let value = match spec.kind {
                FieldKind::Text => json!("batch"),
                FieldKind::Integer => json!(5),
                FieldKind::Float => json!(7.25),
                FieldKind::Status => json!(false),
            };
            (spec.name.to_string(), value)
        })
        .collect();
    json!({"sensor_value": fields, "timestamp": device_time})
}

// ── Request helpers ───────────────────────────────────────────────────────────

async fn send(router: &Router, method: &str, uri: &str, body: Option<&str>) -> (StatusCode, Vec<u8>) {
    let mut builder = Request::builder().method(method).uri(uri);
    if body.is_some() {
        builder = builder.header("content-type", "application/json");
    }
    let request = builder
        .body(body.map_or_else(Body::empty, |b| Body::from(b.to_string())))
        .unwrap();

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, bytes.to_vec())
}

async fn post_json<T: DeserializeOwned>(router: &Router, uri: &str, body: Value) -> (StatusCode, T) {
    let (status, bytes) = send(router, "POST", uri, Some(&body.to_string())).await;
    (status, serde_json::from_slice(&bytes).unwrap())
}

async fn get_json<T: DeserializeOwned>(router: &Router, uri: &str) -> (StatusCode, T) {
    let (status, bytes) = send(router, "GET", uri, None).await;
    (status, serde_json::from_slice(&bytes).unwrap())
}

// ── Commands ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_mix_without_device_reports_not_connected() {
    let app = app();

    let (status, body): (_, MessageResponse) =
        post_json(&app.router, "/mix", json!({"speed": 5})).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.message, "Device not connected");
}

#[tokio::test]
async fn test_mix_reaches_attached_device() {
    // Arrange
    let app = app();
    let (_device, mut inbox) = app.relay.attach(Role::Device);

    // Act
    let (status, body): (_, MessageResponse) =
        post_json(&app.router, "/mix", json!({"speed": 5})).await;

    // Assert
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.message, "Mix command sent with speed 5");
    let wire: Value = serde_json::from_str(&inbox.messages.recv().await.unwrap()).unwrap();
    assert_eq!(wire, json!({"kind": "mix", "speed": 5}));
}

#[tokio::test]
async fn test_stop_needs_no_body() {
    let app = app();
    let (_device, mut inbox) = app.relay.attach(Role::Device);

    let (status, bytes) = send(&app.router, "POST", "/stop", None).await;

    assert_eq!(status, StatusCode::OK);
    let body: MessageResponse = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body.message, "Stop command sent");
    assert_eq!(inbox.messages.recv().await.unwrap(), r#"{"kind":"stop"}"#);
}

#[tokio::test]
async fn test_drain_rate_out_of_range_is_422() {
    let app = app();

    let (status, body): (_, ErrorBody) =
        post_json(&app.router, "/drain", json!({"rate": 150, "duration": 10})).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body.error, "VALIDATION_ERROR");
    assert_eq!(body.field.as_deref(), Some("rate"));
}

#[tokio::test]
async fn test_negative_speed_is_422() {
    let app = app();

    let (status, body): (_, ErrorBody) =
        post_json(&app.router, "/mix", json!({"speed": -1})).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body.field.as_deref(), Some("speed"));
}

#[tokio::test]
async fn test_fermentation_ph_out_of_range_is_422() {
    let app = app();
    let body = json!({
        "temperature": 30.0,
        "pH": 15.0,
        "dissolvedOxygen": 5.0,
        "nutrientConcentration": 1.0,
        "baseConcentration": 1.0,
        "duration": 60,
        "experimentName": "E",
        "comment": ""
    });

    let (status, err): (_, ErrorBody) = post_json(&app.router, "/fermentation", body).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(err.field.as_deref(), Some("pH"));
}

#[tokio::test]
async fn test_malformed_body_is_422() {
    let app = app();

    let (status, bytes) = send(&app.router, "POST", "/mix", Some("{\"speed\":")).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    let body: ErrorBody = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body.error, "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_device_gone_mid_dispatch_is_502() {
    // Arrange: a registered device whose session already ended
    let app = app();
    let (_device, inbox) = app.relay.attach(Role::Device);
    drop(inbox);

    // Act
    let (status, bytes) = send(&app.router, "POST", "/stop", None).await;

    // Assert
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    let body: ErrorBody = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body.error, "TRANSPORT_ERROR");
}

#[tokio::test]
async fn test_stalled_device_answers_503_without_hanging() {
    // Arrange: a device whose writer never drains its queue
    let app = app();
    let (_device, _inbox) = app.relay.attach(Role::Device);
    for _ in 0..OUTBOUND_CAPACITY {
        let (status, _) = send(&app.router, "POST", "/stop", None).await;
        assert_eq!(status, StatusCode::OK);
    }

    // Act
    let (status, bytes) = tokio::time::timeout(
        Duration::from_secs(2),
        send(&app.router, "POST", "/stop", None),
    )
    .await
    .expect("command handler waited on a full device queue");

    // Assert
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    let body: ErrorBody = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body.error, "DEVICE_BUSY");
}

// ── Telemetry ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_missing_field_is_400_and_stores_nothing() {
    // Arrange
    let app = app();
    let mut body = report("t0");
    body["sensor_value"].as_object_mut().unwrap().remove("oxygen");

    // Act
    let (status, err): (_, ErrorBody) = post_json(&app.router, "/sensor_data", body).await;
    let (_, rows): (_, Vec<Value>) = get_json(&app.router, "/sensor_data").await;

    // Assert
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(err.error, "MISSING_FIELD");
    assert_eq!(err.field.as_deref(), Some("oxygen"));
    assert!(rows.is_empty());
}

#[tokio::test]
async fn test_mistyped_field_is_422() {
    let app = app();
    let mut body = report("t0");
    body["sensor_value"]["waterTemp"] = json!("warm");

    let (status, err): (_, ErrorBody) = post_json(&app.router, "/sensor_data", body).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(err.error, "INVALID_FIELD");
    assert_eq!(err.field.as_deref(), Some("waterTemp"));
}

#[tokio::test]
async fn test_ingested_reports_read_back_in_order() {
    // Arrange
    let app = app();

    // Act
    let mut records = Vec::new();
    for i in 0..4 {
        let (status, body): (_, IngestResponse) =
            post_json(&app.router, "/sensor_data", report(&format!("t{i}"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.status, "success");
        records.push(body.record);
    }
    let (status, rows): (_, Vec<Map<String, Value>>) = get_json(&app.router, "/sensor_data").await;

    // Assert
    assert_eq!(status, StatusCode::OK);
    assert_eq!(records, vec![1, 2, 3, 4]);
    assert_eq!(rows.len(), 4);
    for (i, row) in rows.iter().enumerate() {
        assert_eq!(row["ESP_Time"], json!(format!("t{i}")));
        assert_eq!(row["ph"], json!("7.25"));
        assert_eq!(row["airPumpStatus"], json!("0"));
        let columns: Vec<&str> = row.keys().map(String::as_str).collect();
        assert_eq!(columns.len(), 28);
    }
}

#[tokio::test]
async fn test_storage_failure_is_500() {
    let data_dir = std::env::temp_dir().join(format!("bioreactor-http-{}", Uuid::new_v4()));
    let app = app_with_sink(Arc::new(BrokenDisk), data_dir);

    let (status, err): (_, ErrorBody) =
        post_json(&app.router, "/sensor_data", report("t0")).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(err.error, "STORAGE_ERROR");
}

// ── Health ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_health_reports_connected_roles() {
    let app = app();
    let (_frontend, _inbox) = app.relay.attach(Role::Frontend);

    let (status, health): (_, HealthResponse) = get_json(&app.router, "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(health.status, "ok");
    assert!(!health.device_connected);
    assert!(health.frontend_connected);
}
