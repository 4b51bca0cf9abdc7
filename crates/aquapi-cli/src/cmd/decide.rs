use crate::output::{print_json, print_table};
use aquapi_core::decision::decide;
use aquapi_core::types::{ActivationCondition, ActuatorConfig, ActuatorType, Measurement};
use anyhow::anyhow;
use chrono::{DateTime, Utc};
use clap::Args;

/// Inputs for a dry decision. Times are given relative to now.
#[derive(Args, Debug)]
pub struct DecideArgs {
    /// Activation condition: high, low, low_or_high or always
    #[arg(long)]
    condition: ActivationCondition,

    /// Threshold the reading is compared against
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    condition_value: f64,

    /// Latest sensor reading (omit for "no measurement")
    #[arg(long, allow_negative_numbers = true)]
    value: Option<f64>,

    /// Seconds since the reading was taken
    #[arg(long, default_value_t = 0.0)]
    measured_secs_ago: f64,

    /// Cooldown between activations, in seconds
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    period: f64,

    /// Hold time per activation, in seconds
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    duration: f64,

    /// Seconds since the last activation (omit for "never")
    #[arg(long)]
    last_activated_secs_ago: Option<f64>,

    /// Treat the actuator as disabled
    #[arg(long)]
    disabled: bool,
}

pub fn run(args: DecideArgs, json: bool) -> anyhow::Result<()> {
    let now = Utc::now();
    let last_activated = match args.last_activated_secs_ago {
        Some(secs) => ago(now, secs)?,
        None => DateTime::<Utc>::UNIX_EPOCH,
    };

    let config = ActuatorConfig {
        actuator_id: 0,
        actuator_type: ActuatorType::AcidPump,
        sensor_id: 0,
        condition_value: args.condition_value,
        activation_condition: args.condition,
        activation_period: args.period,
        activation_duration: args.duration,
        enabled: !args.disabled,
        last_activated,
    };
    let measurement = match args.value {
        Some(value) => Some(Measurement::new(0, value, ago(now, args.measured_secs_ago)?)),
        None => None,
    };

    let decision = decide(&config, measurement.as_ref(), now);

    if json {
        return print_json(&decision);
    }
    print_table(
        &["ACTIVATE", "STATUS", "DURATION", "PERIOD", "DETAIL"],
        vec![vec![
            decision.activate.to_string(),
            decision.status.to_string(),
            decision.duration.to_string(),
            decision.period.to_string(),
            decision.status.description().to_string(),
        ]],
    );
    Ok(())
}

fn ago(now: DateTime<Utc>, secs: f64) -> anyhow::Result<DateTime<Utc>> {
    if !secs.is_finite() {
        return Err(anyhow!("time offset must be finite, got {secs}"));
    }
    chrono::Duration::try_milliseconds((secs * 1000.0) as i64)
        .and_then(|delta| now.checked_sub_signed(delta))
        .ok_or_else(|| anyhow!("{secs}s ago is out of range"))
}
