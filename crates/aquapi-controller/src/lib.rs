//! `aquapi-controller`: the execution loop that runs next to the pump.
//!
//! # Architecture
//!
//! ```text
//! ExecutionLoop
//!     │  poll_state / report_activated
//!     ├──────────────────────────────▶ ActuatorApi (HttpClient → aquapi-server)
//!     │  set(On / Off)
//!     └──────────────────────────────▶ LineGuard<OutputLine> (CdevLine | SimulatedLine)
//! ```
//!
//! One loop owns one actuator and one output line. It is blocking and
//! single-threaded; [`Shutdown`] is the only way to stop it from outside.

pub mod client;
pub mod error;
pub mod output;
pub mod runner;
pub mod shutdown;


pub use client::{ActuatorApi, HttpClient};
pub use error::ControllerError;
#[cfg(target_os = "linux")]
pub use output::CdevLine;
pub use output::{
    chip_for_model, detect_chip, Level, LineGuard, LineHistory, OutputLine, SimulatedLine,
    DEVICE_TREE_MODEL,
};
pub use runner::{CycleOutcome, ExecutionLoop, LoopStats, ReportPolicy};
pub use shutdown::Shutdown;

/// Convenience `Result` alias for this crate.
pub type Result<T> = std::result::Result<T, ControllerError>;
