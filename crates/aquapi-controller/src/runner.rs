use std::time::Duration;

use aquapi_core::decision::ActivationDecision;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::client::ActuatorApi;
use crate::output::{Level, LineGuard, OutputLine};
use crate::shutdown::Shutdown;
use crate::Result;

// ─── ReportPolicy ─────────────────────────────────────────────────────────

/// How hard the loop tries to report a completed activation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportPolicy {
    /// Total attempts, including the first. Values below 1 are treated as 1.
    pub attempts: u32,
    pub retry_delay: Duration,
}

impl Default for ReportPolicy {
    fn default() -> Self {
        Self {
            attempts: 1,
            retry_delay: Duration::from_millis(500),
        }
    }
}

// ─── CycleOutcome / LoopStats ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The decision could not be fetched; the output was not touched.
    PollFailed,
    /// The server declined to activate.
    Idle,
    /// The output was cycled ON then OFF. `reported` is false when every
    /// report attempt failed.
    Activated { reported: bool },
    /// Shutdown was requested during the sleep or the hold.
    Interrupted,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LoopStats {
    pub cycles: u64,
    pub poll_failures: u64,
    pub activations: u64,
    pub lost_reports: u64,
    pub last_activation: Option<DateTime<Utc>>,
}

// ─── ExecutionLoop ────────────────────────────────────────────────────────

/// Polls one actuator's decision and drives its output line.
///
/// Cycle: sleep the last known period, poll, then either idle or run
/// ON → hold → OFF → report. The line is wrapped in a [`LineGuard`], so it
/// is OFF whenever the loop is dropped.
pub struct ExecutionLoop<A: ActuatorApi, L: OutputLine> {
    actuator_id: i64,
    api: A,
    line: LineGuard<L>,
    report: ReportPolicy,
    shutdown: Shutdown,
    period: Duration,
    duration: Duration,
    stats: LoopStats,
}

impl<A: ActuatorApi, L: OutputLine> ExecutionLoop<A, L> {
    /// Takes ownership of the line and drives it OFF.
    pub fn new(actuator_id: i64, api: A, line: L, shutdown: Shutdown) -> Result<Self> {
        Ok(Self {
            actuator_id,
            api,
            line: LineGuard::new(line)?,
            report: ReportPolicy::default(),
            shutdown,
            period: Duration::ZERO,
            duration: Duration::ZERO,
            stats: LoopStats::default(),
        })
    }

    pub fn with_report_policy(mut self, report: ReportPolicy) -> Self {
        self.report = report;
        self
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn stats(&self) -> &LoopStats {
        &self.stats
    }

    pub fn level(&self) -> Level {
        self.line.level()
    }

    /// Run cycles until shutdown is triggered or the output fails.
    ///
    /// Poll and report failures never end the loop. The line is OFF when
    /// this returns, on success or error.
    pub fn run(mut self) -> Result<LoopStats> {
        tracing::info!(actuator_id = self.actuator_id, "execution loop started");
        while !self.shutdown.is_triggered() {
            if self.run_cycle()? == CycleOutcome::Interrupted {
                break;
            }
        }
        self.line.set(Level::Off)?;
        tracing::info!(
            actuator_id = self.actuator_id,
            cycles = self.stats.cycles,
            activations = self.stats.activations,
            lost_reports = self.stats.lost_reports,
            "execution loop stopped"
        );
        Ok(std::mem::take(&mut self.stats))
    }

    /// One full cycle. Errors only come from the output line.
    pub fn run_cycle(&mut self) -> Result<CycleOutcome> {
        if self.shutdown.wait_timeout(self.period) {
            return Ok(CycleOutcome::Interrupted);
        }
        self.stats.cycles += 1;

        let decision = match self.api.poll_state(self.actuator_id) {
            Ok(decision) => decision,
            Err(e) => {
                self.stats.poll_failures += 1;
                tracing::warn!(actuator_id = self.actuator_id, error = %e, "poll failed");
                return Ok(CycleOutcome::PollFailed);
            }
        };
        self.apply_timing(&decision);
        tracing::debug!(
            actuator_id = self.actuator_id,
            activate = decision.activate,
            status = %decision.status,
            "decision received"
        );

        if !decision.activate {
            return Ok(CycleOutcome::Idle);
        }
        self.activate()
    }

    fn apply_timing(&mut self, decision: &ActivationDecision) {
        self.period = seconds(decision.period);
        self.duration = seconds(decision.duration);
    }

    fn activate(&mut self) -> Result<CycleOutcome> {
        tracing::info!(
            actuator_id = self.actuator_id,
            duration_ms = self.duration.as_millis() as u64,
            "activating"
        );
        self.line.set(Level::On)?;
        let interrupted = self.shutdown.wait_timeout(self.duration);
        self.line.set(Level::Off)?;
        if interrupted {
            tracing::warn!(
                actuator_id = self.actuator_id,
                "activation cut short by shutdown; not reported"
            );
            return Ok(CycleOutcome::Interrupted);
        }

        self.stats.activations += 1;
        self.stats.last_activation = Some(Utc::now());
        let reported = self.report();
        if !reported {
            self.stats.lost_reports += 1;
        }
        Ok(CycleOutcome::Activated { reported })
    }

    /// Report completion, retrying per the policy. Never touches the line.
    fn report(&mut self) -> bool {
        let attempts = self.report.attempts.max(1);
        for attempt in 1..=attempts {
            match self.api.report_activated(self.actuator_id) {
                Ok(()) => {
                    tracing::debug!(actuator_id = self.actuator_id, attempt, "activation reported");
                    return true;
                }
                Err(e) if attempt < attempts => {
                    tracing::warn!(
                        actuator_id = self.actuator_id,
                        attempt,
                        error = %e,
                        "report failed; retrying"
                    );
                    if self.shutdown.wait_timeout(self.report.retry_delay) {
                        break;
                    }
                }
                Err(e) => {
                    tracing::error!(
                        actuator_id = self.actuator_id,
                        attempts,
                        error = %e,
                        "activation report lost"
                    );
                }
            }
        }
        false
    }
}

/// Seconds from the server as a sleep length; negative, NaN and
/// unrepresentable values become zero.
fn seconds(value: f64) -> Duration {
    Duration::try_from_secs_f64(value.max(0.0)).unwrap_or(Duration::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seconds_clamps_bad_values() {
        assert_eq!(seconds(-1.0), Duration::ZERO);
        assert_eq!(seconds(f64::NAN), Duration::ZERO);
        assert_eq!(seconds(f64::INFINITY), Duration::ZERO);
        assert_eq!(seconds(0.0), Duration::ZERO);
    }

    #[test]
    fn seconds_keeps_fractions() {
        assert_eq!(seconds(0.1), Duration::from_millis(100));
        assert_eq!(seconds(2.5), Duration::from_millis(2500));
    }

    #[test]
    fn default_policy_is_single_attempt() {
        assert_eq!(ReportPolicy::default().attempts, 1);
    }
}
