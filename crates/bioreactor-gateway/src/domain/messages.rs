//! JSON shapes exchanged with peers and HTTP clients.
//!
//! # Relay channel
//!
//! Relayed messages are forwarded verbatim and never parsed.  The only frame
//! the gateway itself originates is the receipt acknowledgement returned to a
//! sender after its message was handed to the other role:
//!
//! ```json
//! {"type":"relay_ack","recipient":"frontend","payload":"<original text>"}
//! ```
//!
//! # HTTP API
//!
//! Command endpoints answer with [`MessageResponse`]; telemetry ingestion with
//! [`IngestResponse`]; every failure with [`ErrorBody`].

use bioreactor_core::Role;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Confirmation text returned by command endpoints when no device is attached.
pub const DEVICE_NOT_CONNECTED: &str = "Device not connected";

// ── Relay channel ─────────────────────────────────────────────────────────────

/// Frames the gateway sends on its own behalf over the relay channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RelayNotice {
    /// The sender's message was queued for `recipient`.
    RelayAck {
        /// Role the message was forwarded to.
        recipient: Role,
        /// The original message text, unchanged.
        payload: String,
    },
}

impl RelayNotice {
    /// Builds the acknowledgement for a message forwarded to `recipient`.
    pub fn ack(recipient: Role, payload: impl Into<String>) -> Self {
        RelayNotice::RelayAck {
            recipient,
            payload: payload.into(),
        }
    }

    /// Serializes the notice to a text frame.
    ///
    /// # Errors
    ///
    /// Returns a `serde_json` error if serialization fails.
    pub fn to_text(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

// ── HTTP bodies ───────────────────────────────────────────────────────────────

/// `{"message": "..."}`: result of a command endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Body of `POST /sensor_data`.
///
/// `sensor_value` is kept loosely typed here; schema validation happens in
/// the ingestion service so that a missing field can be reported by name.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct IngestRequest {
    pub sensor_value: Map<String, Value>,
    /// Device-reported time, stored verbatim in the `ESP_Time` column.
    pub timestamp: String,
}

/// Successful result of `POST /sensor_data`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestResponse {
    pub status: String,
    pub message: String,
    /// 1-based sequence number of the appended row.
    pub record: u64,
}

impl IngestResponse {
    pub fn stored(record: u64) -> Self {
        Self {
            status: "success".to_string(),
            message: "Data received".to_string(),
            record,
        }
    }
}

/// `GET /health` result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub device_connected: bool,
    pub frontend_connected: bool,
}

/// Uniform error body for every non-2xx response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Machine-readable code, e.g. `MISSING_FIELD`.
    pub error: String,
    /// Human-readable description.
    pub message: String,
    /// Offending field, when the error concerns one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_relay_ack_wire_format() {
        // Arrange
        let notice = RelayNotice::ack(Role::Frontend, r#"{"temp":30}"#);

        // Act
        let text = notice.to_text().unwrap();

        // Assert
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(
            value,
            json!({"type": "relay_ack", "recipient": "frontend", "payload": "{\"temp\":30}"})
        );
    }

    #[test]
    fn test_ingest_request_accepts_firmware_shape() {
        let body = json!({
            "sensor_value": {"event": "status", "oxygen": 38.6},
            "timestamp": "12:00:00"
        });

        let req: IngestRequest = serde_json::from_value(body).unwrap();

        assert_eq!(req.timestamp, "12:00:00");
        assert_eq!(req.sensor_value.len(), 2);
    }

    #[test]
    fn test_ingest_request_requires_timestamp() {
        let body = json!({"sensor_value": {}});
        assert!(serde_json::from_value::<IngestRequest>(body).is_err());
    }

    #[test]
    fn test_error_body_omits_absent_field() {
        let body = ErrorBody {
            error: "STORAGE_ERROR".to_string(),
            message: "disk full".to_string(),
            field: None,
        };

        let value = serde_json::to_value(&body).unwrap();

        assert_eq!(value, json!({"error": "STORAGE_ERROR", "message": "disk full"}));
    }

    #[test]
    fn test_ingest_response_stored() {
        let value = serde_json::to_value(IngestResponse::stored(3)).unwrap();
        assert_eq!(
            value,
            json!({"status": "success", "message": "Data received", "record": 3})
        );
    }
}
