//! Validated telemetry snapshots.
//!
//! The device reports its state as a loosely-typed JSON object.  This module
//! turns such an object into a [`TelemetrySnapshot`] in one validation pass
//! driven by [`SNAPSHOT_FIELDS`]:
//!
//! 1. Every schema field must be present.  The first absent one (in column
//!    order) is reported as [`SnapshotError::MissingField`].
//! 2. Every field is coerced according to its [`FieldKind`].  A value that
//!    cannot be coerced is reported as [`SnapshotError::InvalidField`].
//!
//! Fields that are not part of the schema are ignored.  A snapshot either
//! holds a value for every schema field or does not exist at all.

use std::fmt;

use serde_json::{Map, Value};
use thiserror::Error;

use super::schema::{FieldKind, FieldSpec, SNAPSHOT_FIELDS};

/// Why a candidate snapshot was rejected.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SnapshotError {
    /// A required field is absent.
    #[error("Missing field: {0}")]
    MissingField(&'static str),

    /// A field is present but its value has the wrong type or range.
    #[error("Invalid field {field}: expected {expected}, got {found}")]
    InvalidField {
        field: &'static str,
        expected: &'static str,
        found: String,
    },
}

impl SnapshotError {
    /// Name of the field the error refers to.
    pub fn field(&self) -> &'static str {
        match self {
            SnapshotError::MissingField(field) => *field,
            SnapshotError::InvalidField { field, .. } => *field,
        }
    }
}

/// A coerced field value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Integer(i64),
    Float(f64),
    Status(u8),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(s) => f.write_str(s),
            FieldValue::Integer(i) => write!(f, "{i}"),
            FieldValue::Float(x) => write!(f, "{x}"),
            FieldValue::Status(s) => write!(f, "{s}"),
        }
    }
}

/// One complete, type-valid device status report.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetrySnapshot {
    device_time: String,
    // One entry per SNAPSHOT_FIELDS entry, same order.
    values: Vec<FieldValue>,
}

impl TelemetrySnapshot {
    /// Validates `fields` against the schema.
    ///
    /// `device_time` is the timestamp string the device attached to the
    /// report; it is stored as-is and never parsed.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::MissingField`] for the first absent field, or
    /// [`SnapshotError::InvalidField`] for the first value that cannot be
    /// coerced.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use bioreactor_core::{SnapshotError, TelemetrySnapshot};
    /// use serde_json::Map;
    ///
    /// let err = TelemetrySnapshot::from_fields("t0", &Map::new()).unwrap_err();
    /// assert_eq!(err, SnapshotError::MissingField("event"));
    /// ```
    pub fn from_fields(
        device_time: impl Into<String>,
        fields: &Map<String, Value>,
    ) -> Result<Self, SnapshotError> {
        if let Some(missing) = SNAPSHOT_FIELDS
            .iter()
            .find(|spec| !fields.contains_key(spec.name))
        {
            return Err(SnapshotError::MissingField(missing.name));
        }

        let values = SNAPSHOT_FIELDS
            .iter()
            .map(|spec| coerce(spec, fields.get(spec.name).unwrap_or(&Value::Null)))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            device_time: device_time.into(),
            values,
        })
    }

    /// The device-reported timestamp.
    pub fn device_time(&self) -> &str {
        &self.device_time
    }

    /// Returns the value of the schema field `name`.
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        SNAPSHOT_FIELDS
            .iter()
            .position(|spec| spec.name == name)
            .map(|i| &self.values[i])
    }

    /// Iterates over `(field name, value)` pairs in column order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &FieldValue)> {
        SNAPSHOT_FIELDS
            .iter()
            .map(|spec| spec.name)
            .zip(self.values.iter())
    }

    /// Renders every field value as a cell string, in column order.
    pub fn cells(&self) -> impl Iterator<Item = String> + '_ {
        self.values.iter().map(ToString::to_string)
    }
}

// ── Coercion ──────────────────────────────────────────────────────────────────

fn coerce(spec: &FieldSpec, value: &Value) -> Result<FieldValue, SnapshotError> {
    let coerced = match spec.kind {
        FieldKind::Text => value.as_str().map(|s| FieldValue::Text(s.to_string())),
        FieldKind::Integer => as_integer(value).map(FieldValue::Integer),
        FieldKind::Float => as_float(value).map(FieldValue::Float),
        FieldKind::Status => as_status(value).map(FieldValue::Status),
    };
    coerced.ok_or_else(|| SnapshotError::InvalidField {
        field: spec.name,
        expected: spec.kind.expected(),
        found: describe(value),
    })
}

fn as_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            // ArduinoJson may emit whole numbers as `5.0`.
            n.as_f64()
                .filter(|x| x.fract() == 0.0 && *x >= i64::MIN as f64 && *x <= i64::MAX as f64)
                .map(|x| x as i64)
        }),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_float(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|x| x.is_finite())
}

fn as_status(value: &Value) -> Option<u8> {
    match value {
        Value::Bool(b) => Some(u8::from(*b)),
        Value::Number(n) => n.as_u64().and_then(|v| u8::try_from(v).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn describe(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Array(_) => "an array".to_string(),
        Value::Object(_) => "an object".to_string(),
        other => other.to_string(),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// A complete snapshot as sent by the device test script.
    fn full_fields() -> Map<String, Value> {
        let value = json!({
            "event": "data",
            "programType": "Fermentation",
            "rateOrSpeed": 0,
            "duration": 0,
            "tempSetpoint": 25.0,
            "phSetpoint": 7.2,
            "doSetpoint": 5.5,
            "nutrientConc": 10.0,
            "baseConc": 1.0,
            "experimentName": "TestExperiment",
            "comment": "This is a test comment",
            "currentProgram": "Fermentation",
            "programStatus": "Running",
            "airPumpStatus": 1,
            "drainPumpStatus": 0,
            "nutrientPumpStatus": 0,
            "basePumpStatus": 0,
            "stirringMotorStatus": 1,
            "heatingPlateStatus": 1,
            "ledGrowLightStatus": 0,
            "waterTemp": 24.5,
            "airTemp": 22.0,
            "ph": 6.8,
            "turbidity": 1.0,
            "oxygen": 7.5,
            "airFlow": 0.5
        });
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_full_snapshot_is_accepted() {
        // Arrange
        let fields = full_fields();

        // Act
        let snapshot = TelemetrySnapshot::from_fields("2024-05-06T12:00:00", &fields).unwrap();

        // Assert
        assert_eq!(snapshot.device_time(), "2024-05-06T12:00:00");
        assert_eq!(snapshot.get("oxygen"), Some(&FieldValue::Float(7.5)));
        assert_eq!(snapshot.get("airPumpStatus"), Some(&FieldValue::Status(1)));
        assert_eq!(
            snapshot.get("programStatus"),
            Some(&FieldValue::Text("Running".to_string()))
        );
        assert_eq!(snapshot.iter().count(), SNAPSHOT_FIELDS.len());
    }

    #[test]
    fn test_missing_oxygen_is_reported_by_name() {
        let mut fields = full_fields();
        fields.remove("oxygen");

        let err = TelemetrySnapshot::from_fields("t", &fields).unwrap_err();

        assert_eq!(err, SnapshotError::MissingField("oxygen"));
        assert_eq!(err.to_string(), "Missing field: oxygen");
    }

    #[test]
    fn test_first_missing_field_in_column_order_wins() {
        let mut fields = full_fields();
        fields.remove("airFlow");
        fields.remove("tempSetpoint");

        let err = TelemetrySnapshot::from_fields("t", &fields).unwrap_err();

        assert_eq!(err, SnapshotError::MissingField("tempSetpoint"));
    }

    #[test]
    fn test_missing_field_reported_before_type_error() {
        // A later missing field still beats an earlier invalid one.
        let mut fields = full_fields();
        fields.insert("rateOrSpeed".to_string(), json!("fast"));
        fields.remove("oxygen");

        let err = TelemetrySnapshot::from_fields("t", &fields).unwrap_err();

        assert_eq!(err, SnapshotError::MissingField("oxygen"));
    }

    #[test]
    fn test_non_numeric_sensor_value_is_invalid() {
        let mut fields = full_fields();
        fields.insert("waterTemp".to_string(), json!("hot"));

        let err = TelemetrySnapshot::from_fields("t", &fields).unwrap_err();

        assert_eq!(err.field(), "waterTemp");
        assert!(matches!(err, SnapshotError::InvalidField { .. }));
    }

    #[test]
    fn test_numeric_strings_are_coerced() {
        let mut fields = full_fields();
        fields.insert("waterTemp".to_string(), json!("24.75"));
        fields.insert("duration".to_string(), json!(" 30 "));
        fields.insert("heatingPlateStatus".to_string(), json!("1"));

        let snapshot = TelemetrySnapshot::from_fields("t", &fields).unwrap();

        assert_eq!(snapshot.get("waterTemp"), Some(&FieldValue::Float(24.75)));
        assert_eq!(snapshot.get("duration"), Some(&FieldValue::Integer(30)));
        assert_eq!(
            snapshot.get("heatingPlateStatus"),
            Some(&FieldValue::Status(1))
        );
    }

    #[test]
    fn test_status_accepts_booleans() {
        let mut fields = full_fields();
        fields.insert("ledGrowLightStatus".to_string(), json!(true));
        fields.insert("airPumpStatus".to_string(), json!(false));

        let snapshot = TelemetrySnapshot::from_fields("t", &fields).unwrap();

        assert_eq!(
            snapshot.get("ledGrowLightStatus"),
            Some(&FieldValue::Status(1))
        );
        assert_eq!(snapshot.get("airPumpStatus"), Some(&FieldValue::Status(0)));
    }

    #[test]
    fn test_status_out_of_range_is_invalid() {
        let mut fields = full_fields();
        fields.insert("drainPumpStatus".to_string(), json!(256));

        let err = TelemetrySnapshot::from_fields("t", &fields).unwrap_err();

        assert_eq!(err.field(), "drainPumpStatus");
    }

    #[test]
    fn test_whole_float_is_accepted_as_integer() {
        let mut fields = full_fields();
        fields.insert("rateOrSpeed".to_string(), json!(120.0));

        let snapshot = TelemetrySnapshot::from_fields("t", &fields).unwrap();

        assert_eq!(snapshot.get("rateOrSpeed"), Some(&FieldValue::Integer(120)));
    }

    #[test]
    fn test_fractional_integer_is_invalid() {
        let mut fields = full_fields();
        fields.insert("duration".to_string(), json!(1.5));

        let err = TelemetrySnapshot::from_fields("t", &fields).unwrap_err();

        assert_eq!(err.field(), "duration");
    }

    #[test]
    fn test_null_text_is_invalid() {
        let mut fields = full_fields();
        fields.insert("comment".to_string(), Value::Null);

        let err = TelemetrySnapshot::from_fields("t", &fields).unwrap_err();

        assert_eq!(
            err,
            SnapshotError::InvalidField {
                field: "comment",
                expected: "a string",
                found: "null".to_string(),
            }
        );
    }

    #[test]
    fn test_unknown_fields_are_ignored() {
        let mut fields = full_fields();
        fields.insert("ox".to_string(), json!(7.5));
        fields.insert("wT".to_string(), json!("garbage"));

        assert!(TelemetrySnapshot::from_fields("t", &fields).is_ok());
    }

    #[test]
    fn test_cells_follow_column_order() {
        let snapshot = TelemetrySnapshot::from_fields("t", &full_fields()).unwrap();

        let cells: Vec<String> = snapshot.cells().collect();

        assert_eq!(cells.len(), SNAPSHOT_FIELDS.len());
        assert_eq!(cells[0], "data");
        assert_eq!(cells[2], "0");
        assert_eq!(cells[4], "25");
        assert_eq!(cells[5], "7.2");
        assert_eq!(cells[25], "0.5");
    }
}
