//! Activation predicates.
//!
//! Each [`ActivationCondition`] maps to one comparison between the measured
//! value and the actuator's `condition_value`. Comparisons are plain IEEE-754
//! ordered comparisons, so a NaN reading fails every comparison-based
//! predicate. `Always` ignores its inputs entirely, NaN included.

use crate::types::ActivationCondition;

/// Half-width of the `LowOrHigh` band, as a fraction of `|condition_value|`.
pub const LOW_OR_HIGH_TOLERANCE: f64 = 0.10;

impl ActivationCondition {
    /// Whether `value` satisfies this condition against `condition_value`.
    pub fn test(self, value: f64, condition_value: f64) -> bool {
        match self {
            ActivationCondition::High => value > condition_value,
            ActivationCondition::Low => value < condition_value,
            ActivationCondition::LowOrHigh => {
                let tol = condition_value.abs() * LOW_OR_HIGH_TOLERANCE;
                value < condition_value - tol || value > condition_value + tol
            }
            ActivationCondition::Always => true,
        }
    }
}
