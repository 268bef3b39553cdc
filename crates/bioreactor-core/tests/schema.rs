//! Integration tests for the telemetry pipeline through the public API.
//!
//! A device report travels JSON mapping → `TelemetrySnapshot` → `RecordRow` →
//! `StoredRow`; these tests check that every stage keeps the fixed column order.

use bioreactor_core::{
    FieldKind, FieldValue, RecordRow, SnapshotError, StoredRow, TelemetrySnapshot, RECORD_HEADER,
    SNAPSHOT_FIELDS,
};
use serde_json::{json, Map, Value};

/// A report with a type-correct value for every schema field.
fn complete_report() -> Map<String, Value> {
    SNAPSHOT_FIELDS
        .iter()
        .map(|spec| {
            let value = match spec.kind {
                FieldKind::Text => json!(format!("{}-text", spec.name)),
                FieldKind::Integer => json!(3),
                FieldKind::Float => json!(1.5),
                FieldKind::Status => json!(true),
            };
            (spec.name.to_string(), value)
        })
        .collect()
}

#[test]
fn test_report_becomes_full_width_row() {
    let snapshot = TelemetrySnapshot::from_fields("10:00:00", &complete_report()).unwrap();

    let row = RecordRow::new("2026-03-01 10:00:01", &snapshot);

    assert_eq!(row.cells().len(), RECORD_HEADER.len());
    assert_eq!(row.cells()[0], "2026-03-01 10:00:01");
    assert_eq!(row.cells()[1], "10:00:00");
    assert_eq!(row.cells()[2], "event-text");
}

#[test]
fn test_stored_row_round_trips_through_json() {
    let snapshot = TelemetrySnapshot::from_fields("10:00:00", &complete_report()).unwrap();
    let stored = StoredRow::from(RecordRow::new("2026-03-01 10:00:01", &snapshot));

    let json = serde_json::to_value(&stored).unwrap();

    assert_eq!(json["ESP_Time"], "10:00:00");
    assert_eq!(json["oxygen"], "1.5");
    assert_eq!(json["airPumpStatus"], "1");
    assert_eq!(json.as_object().map(Map::len), Some(RECORD_HEADER.len()));
}

#[test]
fn test_each_missing_field_is_reported_by_name() {
    for spec in SNAPSHOT_FIELDS.iter() {
        let mut report = complete_report();
        report.remove(spec.name);

        let err = TelemetrySnapshot::from_fields("t", &report).unwrap_err();

        assert_eq!(err, SnapshotError::MissingField(spec.name));
    }
}

#[test]
fn test_extra_fields_are_ignored() {
    let mut report = complete_report();
    report.insert("firmwareBuild".to_string(), json!("v9"));

    let snapshot = TelemetrySnapshot::from_fields("t", &report).unwrap();

    assert_eq!(snapshot.iter().count(), SNAPSHOT_FIELDS.len());
    assert_eq!(snapshot.get("rateOrSpeed"), Some(&FieldValue::Integer(3)));
}
