use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::AquapiError;

// ---------------------------------------------------------------------------
// ActuatorType
// ---------------------------------------------------------------------------

/// What the pump doses. Carried for display only; the control loop treats
/// every type identically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActuatorType {
    AcidPump,
    BasePump,
    NutrientsAPump,
    NutrientsBPump,
}

impl ActuatorType {
    pub fn as_str(self) -> &'static str {
        match self {
            ActuatorType::AcidPump => "acid_pump",
            ActuatorType::BasePump => "base_pump",
            ActuatorType::NutrientsAPump => "nutrients_a_pump",
            ActuatorType::NutrientsBPump => "nutrients_b_pump",
        }
    }
}

impl fmt::Display for ActuatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// ActivationCondition
// ---------------------------------------------------------------------------

/// Which predicate gates actuation. See [`crate::condition`] for the tests
/// each variant applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivationCondition {
    High,
    Low,
    LowOrHigh,
    Always,
}

impl ActivationCondition {
    pub fn all() -> &'static [ActivationCondition] {
        &[
            ActivationCondition::High,
            ActivationCondition::Low,
            ActivationCondition::LowOrHigh,
            ActivationCondition::Always,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ActivationCondition::High => "high",
            ActivationCondition::Low => "low",
            ActivationCondition::LowOrHigh => "low_or_high",
            ActivationCondition::Always => "always",
        }
    }
}

impl fmt::Display for ActivationCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ActivationCondition {
    type Err = AquapiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "high" => Ok(ActivationCondition::High),
            "low" => Ok(ActivationCondition::Low),
            "low_or_high" => Ok(ActivationCondition::LowOrHigh),
            "always" => Ok(ActivationCondition::Always),
            other => Err(AquapiError::Integrity(format!(
                "unknown activation condition '{other}'"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// ActuatorConfig
// ---------------------------------------------------------------------------

/// An actuator as held by the registry.
///
/// `activation_period` and `activation_duration` are in seconds. Only
/// `last_activated` is ever written by the control loop, through the
/// report-back endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActuatorConfig {
    pub actuator_id: i64,
    pub actuator_type: ActuatorType,
    pub sensor_id: i64,
    pub condition_value: f64,
    pub activation_condition: ActivationCondition,
    pub activation_period: f64,
    pub activation_duration: f64,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "Utc::now")]
    pub last_activated: DateTime<Utc>,
}

fn default_enabled() -> bool {
    true
}

// ---------------------------------------------------------------------------
// Measurement
// ---------------------------------------------------------------------------

/// A single sensor reading. `value` comes straight from the probe and may be
/// NaN or infinite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub sensor_id: i64,
    pub value: f64,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl Measurement {
    pub fn new(sensor_id: i64, value: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            sensor_id,
            value,
            timestamp,
        }
    }
}

/// Parse a path segment as an integer id.
pub fn parse_id(raw: &str) -> crate::Result<i64> {
    raw.trim()
        .parse::<i64>()
        .map_err(|_| AquapiError::InvalidId(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn activation_condition_round_trips_through_str() {
        for c in ActivationCondition::all() {
            let parsed: ActivationCondition = c.as_str().parse().unwrap();
            assert_eq!(parsed, *c);
        }
    }

    #[test]
    fn unknown_activation_condition_is_rejected() {
        assert!("sideways".parse::<ActivationCondition>().is_err());
    }

    #[test]
    fn actuator_config_defaults_enabled_and_last_activated() {
        let json = r#"{
            "actuator_id": 3,
            "actuator_type": "acid_pump",
            "sensor_id": 2,
            "condition_value": 6.5,
            "activation_condition": "high",
            "activation_period": 60.0,
            "activation_duration": 2.0
        }"#;
        let before = Utc::now();
        let cfg: ActuatorConfig = serde_json::from_str(json).unwrap();
        assert!(cfg.enabled);
        assert!(cfg.last_activated >= before);
        assert_eq!(cfg.activation_condition, ActivationCondition::High);
        assert_eq!(cfg.actuator_type, ActuatorType::AcidPump);
    }

    #[test]
    fn measurement_without_timestamp_is_stamped_now() {
        let before = Utc::now();
        let m: Measurement = serde_json::from_str(r#"{"sensor_id": 1, "value": 7.1}"#).unwrap();
        assert!(m.timestamp >= before);
    }

    #[test]
    fn parse_id_accepts_integers_only() {
        assert_eq!(parse_id("42").unwrap(), 42);
        assert!(matches!(parse_id("abc"), Err(AquapiError::InvalidId(_))));
        assert!(matches!(parse_id("1.5"), Err(AquapiError::InvalidId(_))));
    }
}
