//! Activation decision engine.
//!
//! [`decide`] turns an actuator's configuration, the latest reading of its
//! sensor, and the current time into an [`ActivationDecision`]. It performs
//! no I/O and never fails: missing data, stale data and a disabled actuator
//! are ordinary outcomes reported through [`DecisionStatus`].
//!
//! The checks run in a fixed order and the first one that matches decides:
//!
//! ```text
//! disabled?            → Disabled
//! no reading?          → NoMeasurement
//! reading older 24h?   → Disconnected
//! inside cooldown?     → CooldownActive
//! otherwise            → OK, activate = predicate(value, condition_value)
//! ```

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::{ActuatorConfig, Measurement};

/// Age after which a sensor's latest reading marks it as disconnected.
pub const DISCONNECTED_THRESHOLD_HOURS: i64 = 24;

pub fn disconnected_threshold() -> Duration {
    Duration::hours(DISCONNECTED_THRESHOLD_HOURS)
}

// ---------------------------------------------------------------------------
// DecisionStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DecisionStatus {
    #[serde(rename = "OK")]
    Ok,
    Disabled,
    NoMeasurement,
    Disconnected,
    CooldownActive,
}

impl DecisionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            DecisionStatus::Ok => "OK",
            DecisionStatus::Disabled => "Disabled",
            DecisionStatus::NoMeasurement => "NoMeasurement",
            DecisionStatus::Disconnected => "Disconnected",
            DecisionStatus::CooldownActive => "CooldownActive",
        }
    }

    /// Operator-facing explanation of the status.
    pub fn description(self) -> &'static str {
        match self {
            DecisionStatus::Ok => "condition evaluated",
            DecisionStatus::Disabled => "actuator is disabled",
            DecisionStatus::NoMeasurement => "sensor has not recorded any measurement",
            DecisionStatus::Disconnected => {
                "latest measurement is too old, sensor is possibly disconnected"
            }
            DecisionStatus::CooldownActive => "activation period has not elapsed yet",
        }
    }
}

impl fmt::Display for DecisionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// ActivationDecision
// ---------------------------------------------------------------------------

/// One decision snapshot, as served to the execution loop.
///
/// `duration` and `period` echo the actuator's configuration on every branch
/// so the loop always knows how long to hold and how long to sleep.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ActivationDecision {
    pub activate: bool,
    pub status: DecisionStatus,
    pub duration: f64,
    pub period: f64,
}

impl ActivationDecision {
    fn new(config: &ActuatorConfig, activate: bool, status: DecisionStatus) -> Self {
        Self {
            activate,
            status,
            duration: config.activation_duration,
            period: config.activation_period,
        }
    }
}

// ---------------------------------------------------------------------------
// decide
// ---------------------------------------------------------------------------

/// Decide whether `config`'s actuator should fire at `now`.
///
/// `last_measurement` must be the newest reading of `config.sensor_id`; a
/// reading from any other sensor is treated as no reading at all. A negative
/// `activation_period` never blocks (elapsed time always exceeds it).
pub fn decide(
    config: &ActuatorConfig,
    last_measurement: Option<&Measurement>,
    now: DateTime<Utc>,
) -> ActivationDecision {
    if !config.enabled {
        return ActivationDecision::new(config, false, DecisionStatus::Disabled);
    }

    let Some(measurement) = last_measurement.filter(|m| m.sensor_id == config.sensor_id) else {
        return ActivationDecision::new(config, false, DecisionStatus::NoMeasurement);
    };

    if now - measurement.timestamp > disconnected_threshold() {
        return ActivationDecision::new(config, false, DecisionStatus::Disconnected);
    }

    if seconds_between(config.last_activated, now) < config.activation_period {
        return ActivationDecision::new(config, false, DecisionStatus::CooldownActive);
    }

    let activate = config
        .activation_condition
        .test(measurement.value, config.condition_value);
    ActivationDecision::new(config, activate, DecisionStatus::Ok)
}

/// Signed seconds from `earlier` to `later`, at microsecond resolution.
fn seconds_between(earlier: DateTime<Utc>, later: DateTime<Utc>) -> f64 {
    let delta = later - earlier;
    match delta.num_microseconds() {
        Some(us) => us as f64 / 1_000_000.0,
        None => delta.num_seconds() as f64,
    }
}
