//! The operator command set.
//!
//! Operators can ask the device to do exactly four things: stir the culture
//! (`Mix`), run the drain pump (`Drain`), start a fermentation run with a full
//! parameter profile (`Fermentation`), or halt everything (`Stop`).  These are
//! modelled as one sum type, [`Command`], so adding a fifth kind of command is
//! a compile error everywhere the set is matched on.
//!
//! # From request to command
//!
//! HTTP bodies are deserialized into the permissive `*Params` shapes
//! ([`MixParams`], [`DrainParams`], [`FermentationParams`]), which accept any
//! JSON number.  Converting them with `Command::try_from` applies the domain
//! rules and produces a [`ValidationError`] naming the offending field:
//!
//! | Field | Rule |
//! |-------|------|
//! | `speed` | integer, `0..=u32::MAX` |
//! | `rate` | integer, `0..=100` (pump duty in percent) |
//! | `duration` | integer seconds, `0..=u32::MAX` |
//! | `temperature` | finite |
//! | `pH` | finite, `0.0..=14.0` |
//! | `dissolvedOxygen`, `nutrientConcentration`, `baseConcentration` | finite, `>= 0` |
//!
//! # Wire format
//!
//! A command is sent to the device as one JSON object whose `kind` field names
//! the variant; the variant's own fields follow under their original names:
//!
//! ```json
//! {"kind":"mix","speed":5}
//! {"kind":"drain","rate":50,"duration":120}
//! {"kind":"stop"}
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Highest accepted drain pump rate, in percent of full duty.
pub const MAX_DRAIN_RATE: u8 = 100;

/// Accepted pH setpoint range.
pub const PH_RANGE: std::ops::RangeInclusive<f64> = 0.0..=14.0;

/// A command parameter failed its domain check.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("invalid {field}: {reason}")]
pub struct ValidationError {
    /// Wire name of the offending field (e.g. `"rate"`, `"pH"`).
    pub field: &'static str,
    /// Human-readable description of the violated rule.
    pub reason: String,
}

impl ValidationError {
    fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

// ── Command ───────────────────────────────────────────────────────────────────

/// A validated operator command bound for the device.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Command {
    /// Run the stirring motor at `speed` RPM.
    Mix { speed: u32 },
    /// Run the drain pump at `rate` percent for `duration` seconds.
    Drain { rate: u8, duration: u32 },
    /// Start a fermentation run.
    Fermentation(FermentationProfile),
    /// Stop every running program and actuator.
    Stop,
}

/// Setpoints and metadata of a fermentation run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FermentationProfile {
    /// Culture temperature setpoint (°C).
    pub temperature: f64,
    /// pH setpoint.
    #[serde(rename = "pH")]
    pub ph: f64,
    /// Dissolved oxygen setpoint (mg/L).
    pub dissolved_oxygen: f64,
    /// Nutrient feed concentration.
    pub nutrient_concentration: f64,
    /// Base (pH correction) concentration.
    pub base_concentration: f64,
    /// Run length in seconds.
    pub duration: u32,
    /// Free-text experiment label recorded with every telemetry row.
    pub experiment_name: String,
    /// Free-text operator comment.
    pub comment: String,
}

impl Command {
    /// Short lowercase name of the variant, identical to the wire `kind`.
    pub fn kind(&self) -> &'static str {
        match self {
            Command::Mix { .. } => "mix",
            Command::Drain { .. } => "drain",
            Command::Fermentation(_) => "fermentation",
            Command::Stop => "stop",
        }
    }

    /// Re-checks the domain rules.
    ///
    /// Commands built with `try_from` already satisfy them; this catches
    /// values assembled by hand (e.g. a `Drain` with `rate: 250`).
    ///
    /// # Errors
    ///
    /// Returns the first [`ValidationError`] found.
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            Command::Mix { .. } | Command::Stop => Ok(()),
            Command::Drain { rate, .. } => {
                if *rate > MAX_DRAIN_RATE {
                    return Err(ValidationError::new(
                        "rate",
                        format!("must be between 0 and {MAX_DRAIN_RATE}, got {rate}"),
                    ));
                }
                Ok(())
            }
            Command::Fermentation(profile) => profile.validate(),
        }
    }

    /// Serializes the command to its device wire format (one JSON object).
    ///
    /// # Errors
    ///
    /// Returns a `serde_json` error only if a float field is not finite,
    /// which [`Command::validate`] rules out.
    pub fn to_wire(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Human-readable confirmation echoing the command's key parameters.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use bioreactor_core::Command;
    ///
    /// let cmd = Command::Mix { speed: 5 };
    /// assert_eq!(cmd.confirmation(), "Mix command sent with speed 5");
    /// ```
    pub fn confirmation(&self) -> String {
        match self {
            Command::Mix { speed } => format!("Mix command sent with speed {speed}"),
            Command::Drain { rate, duration } => {
                format!("Drain command sent with rate {rate} and duration {duration}")
            }
            Command::Fermentation(p) => format!(
                "Fermentation command sent for experiment '{}' (temperature {}, pH {}, \
                 dissolved oxygen {}, nutrient {}, base {}, duration {})",
                p.experiment_name,
                p.temperature,
                p.ph,
                p.dissolved_oxygen,
                p.nutrient_concentration,
                p.base_concentration,
                p.duration
            ),
            Command::Stop => "Stop command sent".to_string(),
        }
    }
}

impl FermentationProfile {
    fn validate(&self) -> Result<(), ValidationError> {
        finite("temperature", self.temperature)?;
        let ph = finite("pH", self.ph)?;
        if !PH_RANGE.contains(&ph) {
            return Err(ValidationError::new(
                "pH",
                format!(
                    "must be between {} and {}, got {ph}",
                    PH_RANGE.start(),
                    PH_RANGE.end()
                ),
            ));
        }
        non_negative("dissolvedOxygen", self.dissolved_oxygen)?;
        non_negative("nutrientConcentration", self.nutrient_concentration)?;
        non_negative("baseConcentration", self.base_concentration)?;
        Ok(())
    }
}

// ── Request parameter shapes ──────────────────────────────────────────────────

/// Body of a mix request: `{"speed": 5}`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MixParams {
    pub speed: i64,
}

/// Body of a drain request: `{"rate": 50, "duration": 120}`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DrainParams {
    pub rate: i64,
    pub duration: i64,
}

/// Body of a fermentation request.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FermentationParams {
    pub temperature: f64,
    #[serde(rename = "pH")]
    pub ph: f64,
    pub dissolved_oxygen: f64,
    pub nutrient_concentration: f64,
    pub base_concentration: f64,
    pub duration: i64,
    pub experiment_name: String,
    pub comment: String,
}

impl TryFrom<MixParams> for Command {
    type Error = ValidationError;

    fn try_from(params: MixParams) -> Result<Self, Self::Error> {
        Ok(Command::Mix {
            speed: non_negative_int("speed", params.speed)?,
        })
    }
}

impl TryFrom<DrainParams> for Command {
    type Error = ValidationError;

    fn try_from(params: DrainParams) -> Result<Self, Self::Error> {
        let rate = u8::try_from(params.rate)
            .ok()
            .filter(|r| *r <= MAX_DRAIN_RATE)
            .ok_or_else(|| {
                ValidationError::new(
                    "rate",
                    format!("must be between 0 and {MAX_DRAIN_RATE}, got {}", params.rate),
                )
            })?;
        let command = Command::Drain {
            rate,
            duration: non_negative_int("duration", params.duration)?,
        };
        command.validate()?;
        Ok(command)
    }
}

impl TryFrom<FermentationParams> for Command {
    type Error = ValidationError;

    fn try_from(params: FermentationParams) -> Result<Self, Self::Error> {
        let profile = FermentationProfile {
            temperature: params.temperature,
            ph: params.ph,
            dissolved_oxygen: params.dissolved_oxygen,
            nutrient_concentration: params.nutrient_concentration,
            base_concentration: params.base_concentration,
            duration: non_negative_int("duration", params.duration)?,
            experiment_name: params.experiment_name,
            comment: params.comment,
        };
        profile.validate()?;
        Ok(Command::Fermentation(profile))
    }
}

// ── Field checks ──────────────────────────────────────────────────────────────

fn non_negative_int(field: &'static str, value: i64) -> Result<u32, ValidationError> {
    u32::try_from(value).map_err(|_| {
        let reason = if value < 0 {
            format!("must not be negative, got {value}")
        } else {
            format!("must not exceed {}, got {value}", u32::MAX)
        };
        ValidationError::new(field, reason)
    })
}

fn finite(field: &'static str, value: f64) -> Result<f64, ValidationError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ValidationError::new(field, "must be a finite number"))
    }
}

fn non_negative(field: &'static str, value: f64) -> Result<f64, ValidationError> {
    let value = finite(field, value)?;
    if value < 0.0 {
        return Err(ValidationError::new(
            field,
            format!("must not be negative, got {value}"),
        ));
    }
    Ok(value)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
