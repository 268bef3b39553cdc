//! The fixed telemetry schema.
//!
//! [`SNAPSHOT_FIELDS`] lists every field a device status report must carry,
//! in the exact column order of the record store.  The order is part of the
//! on-disk format: once a store file has been created its header is never
//! rewritten, so reordering, renaming, or inserting entries here makes old
//! store files unreadable by the gateway.  Bump [`SCHEMA_VERSION`] whenever
//! this list changes.

/// Version of the field list below.  Logged at startup next to the store path.
pub const SCHEMA_VERSION: u32 = 2;

/// How a field's JSON value is coerced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// A JSON string.
    Text,
    /// A JSON integer, or a string holding one.
    Integer,
    /// Any finite JSON number, or a string holding one.
    Float,
    /// An actuator on/off or level flag: a boolean, or an integer in `0..=255`.
    Status,
}

impl FieldKind {
    /// Short description used in validation error messages.
    pub fn expected(self) -> &'static str {
        match self {
            FieldKind::Text => "a string",
            FieldKind::Integer => "an integer",
            FieldKind::Float => "a finite number",
            FieldKind::Status => "a boolean or an integer between 0 and 255",
        }
    }
}

/// One schema entry: the field's wire name and its kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
}

const fn field(name: &'static str, kind: FieldKind) -> FieldSpec {
    FieldSpec { name, kind }
}

/// Every required snapshot field, in record-store column order.
pub const SNAPSHOT_FIELDS: [FieldSpec; 26] = [
    // Program identity and status
    field("event", FieldKind::Text),
    field("programType", FieldKind::Text),
    field("rateOrSpeed", FieldKind::Integer),
    field("duration", FieldKind::Integer),
    // Setpoints
    field("tempSetpoint", FieldKind::Float),
    field("phSetpoint", FieldKind::Float),
    field("doSetpoint", FieldKind::Float),
    field("nutrientConc", FieldKind::Float),
    field("baseConc", FieldKind::Float),
    // Experiment metadata
    field("experimentName", FieldKind::Text),
    field("comment", FieldKind::Text),
    field("currentProgram", FieldKind::Text),
    field("programStatus", FieldKind::Text),
    // Actuators
    field("airPumpStatus", FieldKind::Status),
    field("drainPumpStatus", FieldKind::Status),
    field("nutrientPumpStatus", FieldKind::Status),
    field("basePumpStatus", FieldKind::Status),
    field("stirringMotorStatus", FieldKind::Status),
    field("heatingPlateStatus", FieldKind::Status),
    field("ledGrowLightStatus", FieldKind::Status),
    // Sensors
    field("waterTemp", FieldKind::Float),
    field("airTemp", FieldKind::Float),
    field("ph", FieldKind::Float),
    field("turbidity", FieldKind::Float),
    field("oxygen", FieldKind::Float),
    field("airFlow", FieldKind::Float),
];

/// Returns the schema entry for `name`, if there is one.
pub fn lookup(name: &str) -> Option<&'static FieldSpec> {
    SNAPSHOT_FIELDS.iter().find(|f| f.name == name)
}
